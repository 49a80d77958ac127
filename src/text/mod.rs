mod encoder;
mod errors;
mod sink;

pub use encoder::Charset;
pub use encoder::Encoder;
pub use encoder::Latin1;
pub use encoder::Utf8;
pub use encoder::REPLACEMENT;

pub use errors::CharsetError;

pub use sink::TextSink;
