use encoding_rs::Encoding;
use std::path::Path;

use crate::utils::PatchError;

/// 默认编码
pub const DEFAULT_ENCODING: &str = "utf-8";

/// 已解码的目标文本
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    pub content: String,
    /// 原文件是否带有 BOM（写回时保留）
    pub had_bom: bool,
}

/// 文本编解码器
///
/// 解码和编码都是严格的：无法解码的字节或无法映射的字符直接报错，
/// 不做有损替换，保证未命中的内容逐字节写回。
#[derive(Debug, Clone, Copy)]
pub struct TextCodec {
    encoding: &'static Encoding,
}

impl TextCodec {
    /// 通过编码标签创建编解码器（如 "utf-8"、"windows-1252"）
    pub fn for_label(label: &str) -> Result<Self, PatchError> {
        let encoding = Encoding::for_label(label.trim().as_bytes())
            .ok_or_else(|| PatchError::UnknownEncoding(label.to_string()))?;

        // UTF-16 等编码只能解码不能编码，写回会改变文件编码
        if encoding.output_encoding() != encoding {
            return Err(PatchError::UnknownEncoding(label.to_string()));
        }

        Ok(Self { encoding })
    }

    pub fn utf8() -> Self {
        Self { encoding: encoding_rs::UTF_8 }
    }

    pub fn name(&self) -> &'static str {
        self.encoding.name()
    }

    /// 严格解码
    pub fn decode(&self, bytes: &[u8], path: &Path) -> Result<DecodedText, PatchError> {
        let (body, had_bom) = match Encoding::for_bom(bytes) {
            Some((bom_encoding, bom_len)) if bom_encoding == self.encoding => {
                (&bytes[bom_len..], true)
            }
            _ => (bytes, false),
        };

        let content = self
            .encoding
            .decode_without_bom_handling_and_without_replacement(body)
            .ok_or_else(|| self.encoding_error(path))?;

        Ok(DecodedText {
            content: content.into_owned(),
            had_bom,
        })
    }

    /// 严格编码，必要时补回 BOM
    pub fn encode(&self, text: &str, had_bom: bool, path: &Path) -> Result<Vec<u8>, PatchError> {
        let (encoded, _, had_errors) = self.encoding.encode(text);
        if had_errors {
            return Err(self.encoding_error(path));
        }

        let mut bytes = Vec::with_capacity(encoded.len() + 3);
        if had_bom && self.encoding == encoding_rs::UTF_8 {
            bytes.extend_from_slice(b"\xEF\xBB\xBF");
        }
        bytes.extend_from_slice(&encoded);
        Ok(bytes)
    }

    fn encoding_error(&self, path: &Path) -> PatchError {
        PatchError::Encoding {
            path: path.to_path_buf(),
            encoding: self.encoding.name().to_string(),
        }
    }
}

impl Default for TextCodec {
    fn default() -> Self {
        Self::utf8()
    }
}
