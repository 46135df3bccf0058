// =============================================================================
// API Module
// =============================================================================
//
// Dashboard-facing surface:
// - REST endpoints under /api/v1/ (rest)
// - Push-based WebSocket feed (ws)
// - Optional bearer-token authentication (auth)

pub mod auth;
pub mod rest;
pub mod ws;
