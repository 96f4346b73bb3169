use base64::{engine::general_purpose::STANDARD, Engine};
use std::path::Path;

/// Logo shown in the page header and used as the page icon.
#[derive(Debug, Clone, Default)]
pub struct Branding {
    logo: Option<Vec<u8>>,
    mime: &'static str,
}

impl Branding {
    /// A missing or unreadable logo only costs the branding, never the UI.
    pub fn load(path: &Path) -> Self {
        match std::fs::read(path) {
            Ok(logo) => {
                tracing::info!("Loaded logo from {:?}", path);
                Self {
                    logo: Some(logo),
                    mime: mime_for(path),
                }
            }
            Err(e) => {
                tracing::warn!("Failed to read logo {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    pub fn from_bytes(logo: Vec<u8>, mime: &'static str) -> Self {
        Self {
            logo: Some(logo),
            mime,
        }
    }

    pub fn logo(&self) -> Option<(&[u8], &'static str)> {
        self.logo.as_deref().map(|logo| (logo, self.mime))
    }

    pub fn logo_data_uri(&self) -> Option<String> {
        self.logo()
            .map(|(logo, mime)| format!("data:{};base64,{}", mime, STANDARD.encode(logo)))
    }
}

fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_logo_is_tolerated() {
        let branding = Branding::load(Path::new("./no_such_dir/logo.png"));
        assert!(branding.logo().is_none());
        assert!(branding.logo_data_uri().is_none());
    }

    #[test]
    fn test_logo_data_uri() {
        let branding = Branding::from_bytes(vec![1, 2, 3], "image/png");
        assert_eq!(
            branding.logo_data_uri().as_deref(),
            Some("data:image/png;base64,AQID")
        );
    }

    #[test]
    fn test_mime_for() {
        assert_eq!(mime_for(Path::new("logo/logo.PNG")), "image/png");
        assert_eq!(mime_for(Path::new("logo.jpeg")), "image/jpeg");
        assert_eq!(mime_for(Path::new("logo")), "application/octet-stream");
    }
}
