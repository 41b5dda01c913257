//! Route modules for Resumind Server

pub mod auth;
pub mod features;
pub mod files;
pub mod resumes;
