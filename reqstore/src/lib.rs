#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub use reqstore_core::*;

#[cfg(feature = "default-context")]
mod context;
#[cfg(feature = "default-context")]
pub use context::DefaultContext;

#[cfg(feature = "azure-table")]
pub mod azure_table {
    pub use reqstore_azure_table::*;
}
