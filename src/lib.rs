// MIST Gateway - Library Root
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// All modules exported here for use by the binary and tests.

pub mod config;
pub mod error;
pub mod params;
pub mod paths;

// ============================================================================
// TOOL GROUPS
// ============================================================================

/// Local markdown notes with JSON indexes
pub mod notes;

/// Shared HTTP client and API error mapping
pub mod http;

/// Google OAuth token store and authenticated requests
pub mod google;
pub mod gmail;
pub mod calendar;
pub mod tasks;

/// Git CLI wrapper
pub mod git;

/// Notion REST API
pub mod notion;

// ============================================================================
// MCP SURFACE
// ============================================================================

pub mod resources;
pub mod tools;
pub mod mcp;
