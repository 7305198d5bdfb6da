use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One entry of `flash_extra_images`. Build steps register images as flat
/// `offset, path` runs or as nested lists; both flatten to the same thing.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(untagged)]
pub enum ImageItem {
    Int(i64),
    Str(String),
    List(Vec<ImageItem>),
}

impl From<&str> for ImageItem {
    fn from(value: &str) -> Self {
        ImageItem::Str(value.to_string())
    }
}

impl ImageItem {
    fn flatten_into(&self, out: &mut Vec<String>) {
        match self {
            ImageItem::Int(v) => out.push(v.to_string()),
            ImageItem::Str(s) => out.push(s.clone()),
            ImageItem::List(items) => {
                for item in items {
                    item.flatten_into(out);
                }
            }
        }
    }
}

/// Depth-first flattening, order preserved.
pub fn flatten(items: &[ImageItem]) -> Vec<String> {
    let mut out = Vec::new();
    for item in items {
        item.flatten_into(&mut out);
    }
    out
}

/// An image placed at `offset` in device flash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashImage {
    pub offset: String,
    pub path: String,
}

impl FlashImage {
    pub fn new(offset: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            offset: offset.into(),
            path: path.into(),
        }
    }
}

/// Flattened image arguments, in the order they are handed to the merge
/// tool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageList {
    args: Vec<String>,
}

impl ImageList {
    pub fn from_items(items: &[ImageItem]) -> Self {
        Self {
            args: flatten(items),
        }
    }

    pub fn push(&mut self, image: FlashImage) {
        self.args.push(image.offset);
        self.args.push(image.path);
    }

    /// Complete `(offset, path)` pairs. A trailing unpaired argument is not
    /// included.
    pub fn images(&self) -> impl Iterator<Item = FlashImage> + '_ {
        self.args
            .chunks_exact(2)
            .map(|pair| FlashImage::new(pair[0].as_str(), pair[1].as_str()))
    }

    pub fn is_paired(&self) -> bool {
        self.args.len() % 2 == 0
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_nested() {
        let items = vec![
            ImageItem::from("0x1000"),
            ImageItem::from("bootloader.bin"),
            ImageItem::List(vec![
                ImageItem::Int(0x8000),
                ImageItem::List(vec![ImageItem::from("partitions.bin")]),
            ]),
        ];
        assert_eq!(
            flatten(&items),
            ["0x1000", "bootloader.bin", "32768", "partitions.bin"]
        );
    }

    #[test]
    fn app_image_goes_last() {
        let mut list = ImageList::from_items(&[
            ImageItem::from("0x1000"),
            ImageItem::from("bootloader.bin"),
        ]);
        list.push(FlashImage::new("0x10000", "/build/firmware.bin"));

        assert_eq!(
            list.args(),
            ["0x1000", "bootloader.bin", "0x10000", "/build/firmware.bin"]
        );
        let images: Vec<_> = list.images().collect();
        assert_eq!(
            images.last(),
            Some(&FlashImage::new("0x10000", "/build/firmware.bin"))
        );
    }

    #[test]
    fn unpaired_detected() {
        let list = ImageList::from_items(&[ImageItem::from("0x1000")]);
        assert!(!list.is_paired());
        assert_eq!(list.images().count(), 0);
        assert!(ImageList::default().is_paired());
    }
}
