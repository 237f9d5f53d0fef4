// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base trait shared by the service-backed adapters.

use async_trait::async_trait;

use crate::error::VigilError;
use crate::types::{AdapterType, HealthStatus};

/// Identity and health surface of an adapter talking to an external service.
#[async_trait]
pub trait PluginAdapter: Send + Sync + 'static {
    /// Returns the human-readable name of this adapter instance.
    fn name(&self) -> &str;

    /// Returns the semantic version of this adapter.
    fn version(&self) -> semver::Version;

    /// Returns which collaborator role this adapter fills.
    fn adapter_type(&self) -> AdapterType;

    /// Performs a health check and returns the adapter's current status.
    async fn health_check(&self) -> Result<HealthStatus, VigilError>;
}
