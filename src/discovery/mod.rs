mod scanner;

pub use scanner::ExtensionScanner;
