use serde::{Deserialize, Serialize};
use url::Url;

/// One asset entry in a manifest. The file name is `<name>.<type>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Emote {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Stickers share the emote entry shape.
pub type Sticker = Emote;

impl Emote {
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.name, self.kind)
    }
}

/// A repository's `index.json`.
///
/// Required: `icon`, `name`, `path`, `emotes`. Optional: `author`,
/// `stickerPath`, `stickers`. Unknown fields are ignored; a missing required
/// field fails the whole decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Icon path relative to the repository URL
    pub icon: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Display name, used for sorting
    pub name: String,
    /// Emote directory relative to the repository URL
    pub path: String,
    pub emotes: Vec<Emote>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sticker_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stickers: Option<Vec<Sticker>>,
}

impl Manifest {
    pub fn icon_url(&self, source: &Url) -> Option<Url> {
        join_relative(source, &self.icon)
    }

    pub fn emote_url(&self, source: &Url, emote: &Emote) -> Option<Url> {
        let dir = join_relative(source, &self.path)?;
        join_relative(&dir, &emote.file_name())
    }

    /// URLs of every emote, in manifest order. Entries that cannot form a URL are skipped.
    pub fn emote_urls(&self, source: &Url) -> Vec<Url> {
        self.emotes
            .iter()
            .filter_map(|emote| self.emote_url(source, emote))
            .collect()
    }

    /// `None` when the manifest has no `stickerPath`.
    pub fn sticker_url(&self, source: &Url, sticker: &Sticker) -> Option<Url> {
        let dir = join_relative(source, self.sticker_path.as_deref()?)?;
        join_relative(&dir, &sticker.file_name())
    }

    pub fn sticker_urls(&self, source: &Url) -> Vec<Url> {
        self.stickers
            .iter()
            .flatten()
            .filter_map(|sticker| self.sticker_url(source, sticker))
            .collect()
    }

    pub fn has_stickers(&self) -> bool {
        self.sticker_path.is_some() && self.stickers.as_ref().is_some_and(|s| !s.is_empty())
    }
}

/// Appends the `/`-separated segments of `relative` to `base`'s path.
///
/// Unlike [`Url::join`], the last segment of `base` is kept even without a
/// trailing slash: `https://host/repo` + `emotes` is `https://host/repo/emotes`.
/// Returns `None` for URLs that cannot carry a path (e.g. `mailto:`).
pub fn join_relative(base: &Url, relative: &str) -> Option<Url> {
    let mut url = base.clone();
    {
        let mut segments = url.path_segments_mut().ok()?;
        segments.pop_if_empty();
        segments.extend(relative.split('/').filter(|s| !s.is_empty() && *s != "."));
    }
    Some(url)
}
