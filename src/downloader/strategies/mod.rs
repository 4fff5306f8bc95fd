pub mod script_downloader;

pub use script_downloader::ScriptDownloader;
