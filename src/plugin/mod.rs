pub mod abi;
pub mod helpers;
pub mod host;

pub use abi::{NativeCtx, NativeShaderV1, NativeVersion, ENTRY_SYMBOL, PLUGIN_API_MAJOR};
pub use host::{LoadedPlugin, NativeInstance, PluginError, PluginHost, PluginInfo};
