// ==============================================================================
// lib.rs - Cell Ranger QC Summary Library
// ==============================================================================
// Description: Library interface for QC summary aggregation modules
// Author: Matt Barham
// Created: 2025-11-03
// Modified: 2026-10-19
// Version: 2.0.0
// ==============================================================================

pub mod parsers;
pub mod validator;
pub mod models;
pub mod normalizer;
pub mod rules;
pub mod processor;
pub mod output;
