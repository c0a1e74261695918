#[cfg(feature = "integration_ha")]
pub mod ha;
