use crate::types::{Result, TargetDate};
use std::path::{Path, PathBuf};
use tracing::info;

/// Date-keyed flat files: one text artifact and one PNG per calendar day.
/// Re-running a day overwrites that day's files.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    menu_dir: PathBuf,
    image_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(menu_dir: impl Into<PathBuf>, image_dir: impl Into<PathBuf>) -> Self {
        Self {
            menu_dir: menu_dir.into(),
            image_dir: image_dir.into(),
        }
    }

    pub fn text_path(&self, date: &TargetDate) -> PathBuf {
        self.menu_dir.join(format!("{}.txt", date.iso()))
    }

    pub fn image_path(&self, date: &TargetDate) -> PathBuf {
        self.image_dir.join(format!("{}.png", date.iso()))
    }

    pub async fn write_text(&self, date: &TargetDate, text: &str) -> Result<PathBuf> {
        let path = self.text_path(date);
        write_file(&path, text.as_bytes()).await?;
        info!(path = %path.display(), bytes = text.len(), "Wrote menu artifact");
        Ok(path)
    }

    pub async fn write_image(&self, date: &TargetDate, png: &[u8]) -> Result<PathBuf> {
        let path = self.image_path(date);
        write_file(&path, png).await?;
        info!(path = %path.display(), bytes = png.len(), "Wrote menu image");
        Ok(path)
    }
}

async fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, contents).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date() -> TargetDate {
        TargetDate::new(
            NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
            chrono_tz::America::New_York,
        )
    }

    #[tokio::test]
    async fn writes_date_keyed_files_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("menus"), dir.path().join("imgs"));

        let path = store.write_text(&date(), "first").await.unwrap();
        assert_eq!(path, dir.path().join("menus").join("2026-10-20.txt"));
        store.write_text(&date(), "second").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");

        let image = store.write_image(&date(), &[0x89, b'P', b'N', b'G']).await.unwrap();
        assert_eq!(image, dir.path().join("imgs").join("2026-10-20.png"));
        assert_eq!(std::fs::read(&image).unwrap(), vec![0x89, b'P', b'N', b'G']);
    }
}
