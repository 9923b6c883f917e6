//! Font lookup by resource name

use crate::font::{Font, FontEncoding};
use crate::tounicode::ToUnicodeCMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Name of the fallback font used for unregistered resource names
pub const DEFAULT_FONT_NAME: &str = "DefaultFont";

/// Resolves the font a content stream selects with `Tf`.
///
/// Lookups never fail: an unknown name resolves to a default font.
pub trait FontResolver {
    fn lookup(&self, name: &str) -> Arc<Font>;
}

/// Thread-safe font table with a WinAnsi default.
///
/// Interpreters running on different threads can share one registry.
pub struct FontRegistry {
    fonts: RwLock<HashMap<String, Arc<Font>>>,
    default_font: RwLock<Arc<Font>>,
}

impl Default for FontRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FontRegistry {
    pub fn new() -> Self {
        Self {
            fonts: RwLock::new(HashMap::new()),
            default_font: RwLock::new(Arc::new(
                Font::new(DEFAULT_FONT_NAME, FontEncoding::WinAnsi).with_base_font("Helvetica"),
            )),
        }
    }

    /// Register a font under its own name, replacing any previous one
    pub fn register(&self, font: Font) -> Arc<Font> {
        let font = Arc::new(font);
        self.fonts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(font.name.clone(), Arc::clone(&font));
        font
    }

    /// Register a single-byte font with a named encoding
    pub fn register_simple(&self, name: &str, base_font: &str, encoding: FontEncoding) -> Arc<Font> {
        self.register(Font::new(name, encoding).with_base_font(base_font))
    }

    /// Register a font decoded through a ToUnicode CMap
    pub fn register_with_to_unicode(
        &self,
        name: &str,
        base_font: &str,
        cmap: ToUnicodeCMap,
        is_multi_byte: bool,
    ) -> Arc<Font> {
        self.register(
            Font::new(name, FontEncoding::Custom)
                .with_base_font(base_font)
                .with_to_unicode(Arc::new(cmap))
                .with_multi_byte(is_multi_byte),
        )
    }

    /// Registered font, without the default fallback
    pub fn get(&self, name: &str) -> Option<Arc<Font>> {
        self.fonts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn set_default_font(&self, font: Font) {
        *self
            .default_font
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(font);
    }

    pub fn default_font(&self) -> Arc<Font> {
        self.default_font
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.fonts.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered names in sorted order
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .fonts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Forget every registered font; the default stays
    pub fn clear(&self) {
        self.fonts.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl FontResolver for FontRegistry {
    fn lookup(&self, name: &str) -> Arc<Font> {
        self.get(name).unwrap_or_else(|| self.default_font())
    }
}

impl fmt::Debug for FontRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontRegistry")
            .field("fonts", &self.names())
            .field("default_font", &self.default_font().name)
            .finish()
    }
}

impl fmt::Display for FontRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} font(s), default {}", self.len(), self.default_font())?;
        for name in self.names() {
            if let Some(font) = self.get(&name) {
                writeln!(f, "  {}", font)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_name_falls_back_to_default() {
        let registry = FontRegistry::new();
        let font = registry.lookup("F9");
        assert_eq!(font.name, DEFAULT_FONT_NAME);
        assert_eq!(font.encoding, FontEncoding::WinAnsi);
        assert!(registry.get("F9").is_none());
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = FontRegistry::new();
        registry.register_simple("F1", "Times-Roman", FontEncoding::MacRoman);
        let font = registry.lookup("F1");
        assert_eq!(font.base_font, "Times-Roman");
        assert_eq!(font.encoding, FontEncoding::MacRoman);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_with_to_unicode() {
        let registry = FontRegistry::new();
        let mut cmap = ToUnicodeCMap::new();
        cmap.insert(vec![0x00, 0x01], "A");
        registry.register_with_to_unicode("F2", "Subset+Arial", cmap, true);

        let font = registry.lookup("F2");
        assert_eq!(font.encoding, FontEncoding::Custom);
        assert!(font.is_multi_byte);
        assert_eq!(font.decode(&[0x00, 0x01]), "A");
    }

    #[test]
    fn test_replace_and_clear() {
        let registry = FontRegistry::new();
        registry.register_simple("F1", "A", FontEncoding::WinAnsi);
        registry.register_simple("F1", "B", FontEncoding::WinAnsi);
        registry.register_simple("F0", "C", FontEncoding::PdfDoc);
        assert_eq!(registry.names(), vec!["F0".to_string(), "F1".to_string()]);
        assert_eq!(registry.lookup("F1").base_font, "B");

        registry.clear();
        assert!(registry.is_empty());
        assert_eq!(registry.lookup("F1").name, DEFAULT_FONT_NAME);
    }

    #[test]
    fn test_set_default_font() {
        let registry = FontRegistry::new();
        registry.set_default_font(Font::new("Fallback", FontEncoding::PdfDoc));
        assert_eq!(registry.lookup("missing").name, "Fallback");
        assert_eq!(registry.lookup("missing").decode(&[0x80]), "\u{2022}");
    }

    #[test]
    fn test_concurrent_lookups() {
        let registry = FontRegistry::new();
        registry.register_simple("F1", "Helvetica", FontEncoding::WinAnsi);

        std::thread::scope(|s| {
            for i in 0..8 {
                let registry = &registry;
                s.spawn(move || {
                    for _ in 0..100 {
                        assert_eq!(registry.lookup("F1").base_font, "Helvetica");
                    }
                    registry.register_simple(&format!("T{}", i), "Courier", FontEncoding::WinAnsi);
                });
            }
        });

        assert_eq!(registry.len(), 9);
    }
}
