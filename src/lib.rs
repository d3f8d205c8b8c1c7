// 公开导出的模块，供外部使用
pub mod errors;
pub mod models;
pub mod normalizer;
pub mod record_provider;

// 为了支持主程序，暂时保持这些模块公开
// 但在库使用场景中，这些应该是内部模块
#[doc(hidden)]
pub mod config;
#[doc(hidden)]
pub mod publisher;
#[doc(hidden)]
pub mod scrapers;
#[doc(hidden)]
pub mod services;
#[doc(hidden)]
pub mod util;

// 重新导出常用类型，方便使用
pub use errors::{QuoteHubError, Result};
pub use models::quote::{QuoteRecord, RawQuoteSources};
pub use normalizer::{normalize, DilutionPolicy, ReferencePolicy};
pub use record_provider::QuoteRecordProvider;
