//! Locating font files for a [`FontDescriptor`]

use crate::error::{Result, WatermarkError};
use crate::models::FontDescriptor;
use ab_glyph::FontVec;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

const FONT_EXTENSIONS: [&str; 3] = ["ttf", "otf", "ttc"];

/// Maps font families to font files found in a set of directories
#[derive(Debug, Clone)]
pub struct FontResolver {
    directories: Vec<PathBuf>,
}

impl FontResolver {
    pub fn new(directories: Vec<PathBuf>) -> Self {
        Self { directories }
    }

    /// Resolver over the platform's usual font folders
    pub fn system() -> Self {
        Self::new(Self::default_directories())
    }

    pub fn default_directories() -> Vec<PathBuf> {
        let mut directories = Vec::new();

        if let Some(user_fonts) = dirs::font_dir() {
            directories.push(user_fonts);
        }

        #[cfg(target_os = "linux")]
        {
            directories.push(PathBuf::from("/usr/share/fonts"));
            directories.push(PathBuf::from("/usr/local/share/fonts"));
            if let Some(home) = dirs::home_dir() {
                directories.push(home.join(".fonts"));
            }
        }

        #[cfg(target_os = "macos")]
        {
            directories.push(PathBuf::from("/Library/Fonts"));
            directories.push(PathBuf::from("/System/Library/Fonts"));
        }

        #[cfg(target_os = "windows")]
        {
            let windir = std::env::var_os("WINDIR").unwrap_or_else(|| "C:\\Windows".into());
            directories.push(PathBuf::from(windir).join("Fonts"));
        }

        directories
    }

    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }

    /// Every font file under the search directories, keyed by normalized stem
    pub fn scan(&self) -> BTreeMap<String, PathBuf> {
        let mut fonts = BTreeMap::new();

        for directory in self.directories.iter().filter(|d| d.is_dir()) {
            for entry in WalkDir::new(directory)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let path = entry.path();
                if !entry.file_type().is_file() || !is_font_file(path) {
                    continue;
                }
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    fonts
                        .entry(normalize(stem))
                        .or_insert_with(|| path.to_path_buf());
                }
            }
        }

        fonts
    }

    /// Pick the font file that best matches family and style
    ///
    /// A family naming an existing file is used as-is. Otherwise styled
    /// variants (`FamilyBold`, `Family-BoldItalic`, ...) are preferred and
    /// the regular face is the fallback.
    pub fn resolve(&self, font: &FontDescriptor) -> Result<PathBuf> {
        let direct = Path::new(&font.family);
        if direct.is_file() {
            return Ok(direct.to_path_buf());
        }

        let fonts = self.scan();
        let family = normalize(&font.family);
        let path = style_suffixes(font.bold, font.italic)
            .iter()
            .find_map(|suffix| fonts.get(&format!("{}{}", family, suffix)))
            .ok_or_else(|| WatermarkError::FontNotFound {
                family: font.family.clone(),
            })?;

        debug!("Resolved font '{}' to {}", font, path.display());
        Ok(path.clone())
    }

    /// Resolve and parse the font
    pub fn load(&self, font: &FontDescriptor) -> Result<FontVec> {
        let path = self.resolve(font)?;
        load_font_file(&path)
    }
}

impl Default for FontResolver {
    fn default() -> Self {
        Self::system()
    }
}

pub fn load_font_file(path: &Path) -> Result<FontVec> {
    let data = std::fs::read(path)?;
    FontVec::try_from_vec(data).map_err(|_| WatermarkError::InvalidFont {
        path: path.to_path_buf(),
    })
}

fn is_font_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| FONT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Lowercase alphanumerics only: "DejaVu Sans-Bold" -> "dejavusansbold"
fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn style_suffixes(bold: bool, italic: bool) -> &'static [&'static str] {
    match (bold, italic) {
        (true, true) => &[
            "bolditalic",
            "boldoblique",
            "bold",
            "italic",
            "oblique",
            "",
            "regular",
            "book",
        ],
        (true, false) => &["bold", "", "regular", "book"],
        (false, true) => &["italic", "oblique", "", "regular", "book"],
        (false, false) => &["", "regular", "book"],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"not really a font").unwrap();
        path
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("DejaVu Sans-Bold"), "dejavusansbold");
        assert_eq!(normalize("Liberation_Mono"), "liberationmono");
    }

    #[test]
    fn test_resolve_prefers_styled_variant() {
        let dir = tempdir().unwrap();
        let regular = touch(dir.path(), "TestSans.ttf");
        let bold = touch(dir.path(), "TestSans-Bold.ttf");
        let italic = touch(dir.path(), "TestSans-Oblique.otf");
        touch(dir.path(), "TestSans.txt");

        let resolver = FontResolver::new(vec![dir.path().to_path_buf()]);

        let mut font = FontDescriptor::new("Test Sans", 12);
        assert_eq!(resolver.resolve(&font).unwrap(), regular);

        font.bold = true;
        assert_eq!(resolver.resolve(&font).unwrap(), bold);

        font.bold = false;
        font.italic = true;
        assert_eq!(resolver.resolve(&font).unwrap(), italic);

        // no bold italic face: fall back to bold
        font.bold = true;
        assert_eq!(resolver.resolve(&font).unwrap(), bold);
    }

    #[test]
    fn test_resolve_searches_subdirectories() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("truetype/test");
        std::fs::create_dir_all(&nested).unwrap();
        let regular = touch(&nested, "Nested-Regular.ttf");

        let resolver = FontResolver::new(vec![dir.path().to_path_buf()]);
        assert_eq!(
            resolver.resolve(&FontDescriptor::new("Nested", 10)).unwrap(),
            regular
        );
    }

    #[test]
    fn test_family_may_be_a_path() {
        let dir = tempdir().unwrap();
        let file = touch(dir.path(), "whatever.ttf");
        let resolver = FontResolver::new(Vec::new());

        let font = FontDescriptor::new(file.to_string_lossy(), 12);
        assert_eq!(resolver.resolve(&font).unwrap(), file);
    }

    #[test]
    fn test_missing_font() {
        let resolver = FontResolver::new(vec![PathBuf::from("/no/such/dir")]);
        let err = resolver
            .resolve(&FontDescriptor::new("Imaginary", 12))
            .unwrap_err();
        assert_eq!(err.error_type(), "font_not_found");
    }

    #[test]
    fn test_invalid_font_file() {
        let dir = tempdir().unwrap();
        let file = touch(dir.path(), "Broken.ttf");
        let err = load_font_file(&file).unwrap_err();
        assert_eq!(err.error_type(), "invalid_font");
    }
}
