use serde::Serialize;
use serde_json::ser::Formatter;
use std::io;

use crate::error::FormatError;

/// JSON layout options used by [`crate::formatter::JsonFormatter`].
///
/// The default minimizes the representation: everything on one line and
/// no whitespace around separators. Each formatter owns its own copy, so
/// changing the layout means building a formatter with a different config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderConfig {
    /// Spaces per nesting level. `None` keeps the document on one line.
    pub indent: Option<usize>,
    /// Written between array elements and object members.
    pub item_separator: String,
    /// Written between an object key and its value.
    pub key_separator: String,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            indent: None,
            item_separator: ",".to_string(),
            key_separator: ":".to_string(),
        }
    }
}

impl EncoderConfig {
    pub fn new(
        indent: Option<usize>,
        item_separator: impl Into<String>,
        key_separator: impl Into<String>,
    ) -> Self {
        Self {
            indent,
            item_separator: item_separator.into(),
            key_separator: key_separator.into(),
        }
    }

    /// Serialize `value` using this layout.
    pub fn encode<T>(&self, value: &T) -> Result<String, FormatError>
    where
        T: Serialize + ?Sized,
    {
        let mut buf = Vec::with_capacity(256);
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, SeparatorFormatter::new(self));
        value.serialize(&mut ser)?;
        String::from_utf8(buf).map_err(|e| FormatError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
    }
}

/// `serde_json` formatter driven by an [`EncoderConfig`].
struct SeparatorFormatter<'a> {
    config: &'a EncoderConfig,
    depth: usize,
    has_value: bool,
}

impl<'a> SeparatorFormatter<'a> {
    fn new(config: &'a EncoderConfig) -> Self {
        Self {
            config,
            depth: 0,
            has_value: false,
        }
    }

    fn newline<W>(&self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if let Some(indent) = self.config.indent {
            writer.write_all(b"\n")?;
            for _ in 0..indent * self.depth {
                writer.write_all(b" ")?;
            }
        }
        Ok(())
    }

    fn begin_member<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if !first {
            writer.write_all(self.config.item_separator.as_bytes())?;
        }
        self.newline(writer)
    }

    fn close<W>(&mut self, writer: &mut W, token: &[u8]) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.depth = self.depth.saturating_sub(1);
        if self.has_value {
            self.newline(writer)?;
        }
        writer.write_all(token)
    }
}

impl Formatter for SeparatorFormatter<'_> {
    fn begin_array<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.depth += 1;
        self.has_value = false;
        writer.write_all(b"[")
    }

    fn end_array<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.close(writer, b"]")
    }

    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.begin_member(writer, first)
    }

    fn end_array_value<W>(&mut self, _writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.has_value = true;
        Ok(())
    }

    fn begin_object<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.depth += 1;
        self.has_value = false;
        writer.write_all(b"{")
    }

    fn end_object<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.close(writer, b"}")
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.begin_member(writer, first)
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(self.config.key_separator.as_bytes())
    }

    fn end_object_value<W>(&mut self, _writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.has_value = true;
        Ok(())
    }
}
