//! The edit-apply pipeline.
//!
//! Each edit runs backup, fill, layout, draw and persist against a working
//! copy of the page while holding that page's lock. The stored page is only
//! written once every step has succeeded, so a failed edit leaves it as it
//! was.

use std::sync::Arc;

use image::{Rgb, RgbImage};
use serde::Serialize;
use tracing::{debug, info};

use crate::backup::{BackupStore, PageLocks, RestoreEngine, RestoreOutcome};
use crate::error::{PageditError, Result};
use crate::fill::{BorderAverageFill, ContentAwareFill, FillProvider, FillStrategy};
use crate::font::{FontAsset, FontResolver};
use crate::geometry::Region;
use crate::layout::TextLayoutEngine;
use crate::mask::RegionMask;
use crate::models::config::{LayoutConfig, PageditConfig};
use crate::models::edit::{EditRequest, parse_hex_color};
use crate::render;
use crate::storage::{PageId, PageStorage};

/// What one edit did to a page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedEdit {
    pub region: Region,
    pub strategy: FillStrategy,
    /// Paint colour used by border-average fill, as `#rrggbb`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_color: Option<String>,
    pub font: FontAsset,
    /// Font size actually drawn.
    pub font_size: u32,
}

/// Result of [`Compositor::apply`].
#[derive(Debug, Clone)]
pub struct CompositeResult {
    pub page: PageId,
    /// Page pixels as persisted.
    pub image: RgbImage,
    pub applied: AppliedEdit,
}

impl CompositeResult {
    pub fn font_size(&self) -> u32 {
        self.applied.font_size
    }
}

/// Result of [`Compositor::apply_batch`].
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub page: PageId,
    pub image: RgbImage,
    /// One entry per edit, in request order.
    pub applied: Vec<AppliedEdit>,
}

/// Builder for [`Compositor`].
pub struct CompositorBuilder {
    storage: Arc<dyn PageStorage>,
    locks: Option<Arc<PageLocks>>,
    mask: RegionMask,
    border_average: BorderAverageFill,
    content_aware: Option<ContentAwareFill>,
    fonts: Option<Arc<FontResolver>>,
    layout: LayoutConfig,
    default_strategy: FillStrategy,
}

impl CompositorBuilder {
    pub fn new(storage: Arc<dyn PageStorage>) -> Self {
        Self {
            storage,
            locks: None,
            mask: RegionMask::new(),
            border_average: BorderAverageFill::new(),
            content_aware: None,
            fonts: None,
            layout: LayoutConfig::default(),
            default_strategy: FillStrategy::default(),
        }
    }

    /// Builder seeded from configuration. Fonts are loaded from
    /// `config.fonts.font_dir`.
    pub fn from_config(storage: Arc<dyn PageStorage>, config: &PageditConfig) -> Result<Self> {
        let fallback = parse_hex_color(&config.fill.fallback_color).ok_or_else(|| {
            PageditError::Config(format!("invalid fallback colour '{}'", config.fill.fallback_color))
        })?;
        let fonts = FontResolver::new(&config.fonts.font_dir, &config.fonts.default_family);

        Ok(Self::new(storage)
            .with_mask_padding(config.fill.mask_padding)
            .with_border_fill(
                BorderAverageFill::new()
                    .with_border_width(config.fill.border_width)
                    .with_fallback(fallback),
            )
            .with_fonts(Arc::new(fonts))
            .with_layout(config.layout)
            .with_default_strategy(config.fill.default_strategy))
    }

    /// Share page locks with other compositors or restore engines.
    pub fn with_locks(mut self, locks: Arc<PageLocks>) -> Self {
        self.locks = Some(locks);
        self
    }

    pub fn with_mask_padding(mut self, padding: u32) -> Self {
        self.mask = RegionMask::new().with_padding(padding);
        self
    }

    pub fn with_border_fill(mut self, fill: BorderAverageFill) -> Self {
        self.border_average = fill;
        self
    }

    /// Enable content-aware fill.
    pub fn with_content_aware(mut self, fill: ContentAwareFill) -> Self {
        self.content_aware = Some(fill);
        self
    }

    pub fn with_fonts(mut self, fonts: Arc<FontResolver>) -> Self {
        self.fonts = Some(fonts);
        self
    }

    pub fn with_layout(mut self, layout: LayoutConfig) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_default_strategy(mut self, strategy: FillStrategy) -> Self {
        self.default_strategy = strategy;
        self
    }

    pub fn build(self) -> Compositor {
        let locks = self.locks.unwrap_or_default();
        let mut fill = FillProvider::new(self.mask, self.border_average);
        if let Some(content_aware) = self.content_aware {
            fill = fill.with_content_aware(content_aware);
        }

        Compositor {
            backups: BackupStore::new(self.storage.clone()),
            restorer: RestoreEngine::new(self.storage.clone(), locks.clone()),
            storage: self.storage,
            locks,
            fill,
            fonts: self.fonts.unwrap_or_else(|| Arc::new(FontResolver::builtin())),
            layout: TextLayoutEngine::new(self.layout),
            default_strategy: self.default_strategy,
        }
    }
}

/// Applies edits to stored pages.
#[derive(Clone)]
pub struct Compositor {
    storage: Arc<dyn PageStorage>,
    locks: Arc<PageLocks>,
    backups: BackupStore,
    restorer: RestoreEngine,
    fill: FillProvider,
    fonts: Arc<FontResolver>,
    layout: TextLayoutEngine,
    default_strategy: FillStrategy,
}

impl Compositor {
    pub fn builder(storage: Arc<dyn PageStorage>) -> CompositorBuilder {
        CompositorBuilder::new(storage)
    }

    pub fn storage(&self) -> &Arc<dyn PageStorage> {
        &self.storage
    }

    /// Apply one edit to a page and persist the result.
    ///
    /// With `restore_first` the edit is drawn over the backup instead of the
    /// current page.
    pub fn apply(&self, page: &PageId, edit: &EditRequest) -> Result<CompositeResult> {
        self.require(page)?;

        self.locks.with_page(page, || {
            let backup = self.backups.ensure(page)?;
            let mut image = if edit.restore_first {
                debug!("Editing {} from backup {}", page, backup.location);
                self.backups.load(page)?
            } else {
                self.storage.load_page(page)?
            };

            let applied = self.composite(&mut image, edit)?;
            self.storage.save_page(page, &image)?;
            info!(
                "Applied edit to {} at {} ({}, {}px)",
                page, applied.region, applied.strategy, applied.font_size
            );

            Ok(CompositeResult {
                page: page.clone(),
                image,
                applied,
            })
        })
    }

    /// Replace a page's edits with `edits`.
    ///
    /// The page is rebuilt from its backup and every edit is applied in
    /// order on that clean base, so running the same batch twice gives the
    /// same pixels. Nothing is persisted unless every edit succeeds.
    pub fn apply_batch(&self, page: &PageId, edits: &[EditRequest]) -> Result<BatchResult> {
        self.require(page)?;

        self.locks.with_page(page, || {
            self.backups.ensure(page)?;
            let mut image = self.backups.load(page)?;

            let applied = edits
                .iter()
                .map(|edit| self.composite(&mut image, edit))
                .collect::<Result<Vec<_>>>()?;

            self.storage.save_page(page, &image)?;
            info!("Applied {} edits to {}", applied.len(), page);

            Ok(BatchResult {
                page: page.clone(),
                image,
                applied,
            })
        })
    }

    /// Revert a page to its backup.
    pub fn restore(&self, page: &PageId) -> Result<RestoreOutcome> {
        self.restorer.restore(page)
    }

    fn require(&self, page: &PageId) -> Result<()> {
        if self.storage.contains(page) {
            Ok(())
        } else {
            Err(PageditError::NotFound(page.to_string()))
        }
    }

    /// Fill the region and draw the text into `image`.
    fn composite(&self, image: &mut RgbImage, edit: &EditRequest) -> Result<AppliedEdit> {
        let strategy = edit.fill_strategy.unwrap_or(self.default_strategy);
        let fill_color = edit.fill_rgb()?;

        let outcome = self.fill.fill(image, &edit.region, strategy, fill_color)?;

        let (font, face) = self.fonts.face_for(&edit.font_family, edit.bold, edit.italic);
        let layout = self.layout.fit_on_page(
            &edit.text,
            edit.region.width as u32,
            edit.region.height as u32,
            &face,
            edit.size_override(),
            image.height(),
        );
        let drawn = render::draw_text(
            image,
            &face,
            &edit.text,
            &layout,
            (edit.region.x, edit.region.y),
            edit.text_rgb(),
        );
        debug!("Drew {:?} at {}px in {} ({} pixels)", edit.text, layout.font_size, font.file, drawn);

        Ok(AppliedEdit {
            region: edit.region,
            strategy,
            fill_color: outcome.color.map(hex),
            font,
            font_size: layout.font_size,
        })
    }
}

fn hex(color: Rgb<u8>) -> String {
    format!("#{:02x}{:02x}{:02x}", color[0], color[1], color[2])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::testing::{FailingInpainter, SolidInpainter};
    use pretty_assertions::assert_eq;

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8]))
    }

    fn setup(image: RgbImage) -> (Arc<MemoryStorage>, PageId) {
        let storage = Arc::new(MemoryStorage::new());
        let page = PageId::new("session", 0);
        storage.insert_page(page.clone(), image);
        (storage, page)
    }

    fn compositor(storage: Arc<MemoryStorage>) -> Compositor {
        Compositor::builder(storage)
            .with_content_aware(ContentAwareFill::new(SolidInpainter::new(Rgb([10, 20, 30]))))
            .build()
    }

    fn edit(x: i32, y: i32, text: &str) -> EditRequest {
        EditRequest::new(Region::new(x, y, 120, 40), text)
    }

    #[test]
    fn test_restore_round_trip() {
        for strategy in [FillStrategy::ContentAware, FillStrategy::BorderAverage] {
            let original = gradient(300, 200);
            let (storage, page) = setup(original.clone());
            let compositor = compositor(storage.clone());

            let result = compositor.apply(&page, &edit(40, 60, "Replaced").with_fill(strategy)).unwrap();
            assert_ne!(result.image, original);
            assert_eq!(storage.load_page(&page).unwrap(), result.image);

            assert_eq!(compositor.restore(&page).unwrap(), RestoreOutcome::Restored);
            assert_eq!(storage.load_page(&page).unwrap(), original);
        }
    }

    #[test]
    fn test_backup_not_refreshed_by_later_edits() {
        let original = gradient(200, 100);
        let (storage, page) = setup(original.clone());
        let compositor = compositor(storage.clone());

        compositor.apply(&page, &edit(0, 0, "one")).unwrap();
        compositor.apply(&page, &edit(50, 50, "two")).unwrap();
        assert_eq!(storage.load_backup(&page).unwrap(), original);
    }

    #[test]
    fn test_restore_without_edits_is_benign() {
        let (storage, page) = setup(gradient(20, 20));
        let compositor = compositor(storage);
        assert_eq!(compositor.restore(&page).unwrap(), RestoreOutcome::NothingToRestore);
    }

    #[test]
    fn test_erase_on_white_stays_white() {
        let white = Rgb([255, 255, 255]);
        let (storage, page) = setup(RgbImage::from_pixel(400, 200, white));
        let compositor = compositor(storage);

        let request = EditRequest::erase(Region::new(50, 50, 200, 40)).with_fill(FillStrategy::BorderAverage);
        let result = compositor.apply(&page, &request).unwrap();
        assert!(result.image.pixels().all(|p| *p == white));
        assert_eq!(result.applied.fill_color.as_deref(), Some("#ffffff"));
    }

    #[test]
    fn test_full_page_region_uses_fallback() {
        let (storage, page) = setup(gradient(10, 10));
        let compositor = compositor(storage);

        let request = EditRequest::erase(Region::new(0, 0, 10, 10)).with_fill(FillStrategy::BorderAverage);
        let result = compositor.apply(&page, &request).unwrap();
        assert_eq!(result.applied.fill_color.as_deref(), Some("#ffffff"));
        assert!(result.image.pixels().all(|p| *p == Rgb([255, 255, 255])));
    }

    #[test]
    fn test_batch_is_idempotent() {
        let (storage, page) = setup(gradient(320, 240));
        let compositor = compositor(storage.clone());
        let edits = vec![
            edit(10, 10, "First"),
            edit(60, 30, "Overlapping").with_fill(FillStrategy::BorderAverage),
            EditRequest::erase(Region::new(200, 150, 60, 60)).with_fill_color("#ff0000").with_fill(FillStrategy::BorderAverage),
        ];

        let first = compositor.apply_batch(&page, &edits).unwrap();
        compositor.apply(&page, &edit(100, 100, "stray")).unwrap();
        let second = compositor.apply_batch(&page, &edits).unwrap();

        assert_eq!(first.applied.len(), 3);
        assert_eq!(first.image, second.image);
        assert_eq!(storage.load_page(&page).unwrap(), second.image);
    }

    #[test]
    fn test_restore_first_discards_previous_edit() {
        let original = gradient(300, 200);
        let (storage, page) = setup(original.clone());
        let compositor = compositor(storage.clone());
        let red = EditRequest::erase(Region::new(0, 0, 50, 50))
            .with_fill(FillStrategy::BorderAverage)
            .with_fill_color("#ff0000");
        compositor.apply(&page, &red).unwrap();

        let other = EditRequest::erase(Region::new(200, 100, 20, 20))
            .with_fill(FillStrategy::BorderAverage)
            .with_fill_color("#0000ff")
            .with_restore_first(true);
        let result = compositor.apply(&page, &other).unwrap();

        assert_eq!(result.image.get_pixel(10, 10), original.get_pixel(10, 10));
        assert_eq!(*result.image.get_pixel(205, 105), Rgb([0, 0, 255]));
    }

    #[test]
    fn test_fill_failure_leaves_page_untouched() {
        let original = gradient(100, 100);
        let (storage, page) = setup(original.clone());
        let compositor = Compositor::builder(storage.clone())
            .with_content_aware(ContentAwareFill::new(FailingInpainter))
            .build();

        let err = compositor.apply(&page, &edit(10, 10, "x")).unwrap_err();
        assert_eq!(err.kind(), "fill_capability");
        assert_eq!(storage.load_page(&page).unwrap(), original);

        let batch = [edit(0, 0, "ok").with_fill(FillStrategy::BorderAverage), edit(10, 10, "fails")];
        assert_eq!(compositor.apply_batch(&page, &batch).unwrap_err().kind(), "fill_capability");
        assert_eq!(storage.load_page(&page).unwrap(), original);
    }

    #[test]
    fn test_missing_inpainter_is_fill_error() {
        let (storage, page) = setup(gradient(50, 50));
        let compositor = Compositor::builder(storage).build();
        let err = compositor.apply(&page, &edit(0, 0, "x")).unwrap_err();
        assert_eq!(err.kind(), "fill_capability");
    }

    #[test]
    fn test_missing_page() {
        let (storage, _) = setup(gradient(10, 10));
        let compositor = compositor(storage);
        let err = compositor.apply(&PageId::new("session", 7), &edit(0, 0, "x")).unwrap_err();
        assert_eq!(err.kind(), "not_found");
        let err = compositor.apply_batch(&PageId::new("other", 0), &[]).unwrap_err();
        assert_eq!(err.kind(), "not_found");
        assert_eq!(compositor.restore(&PageId::new("other", 0)).unwrap_err().kind(), "not_found");
    }

    #[test]
    fn test_region_off_page_is_rejected() {
        let original = gradient(100, 100);
        let (storage, page) = setup(original.clone());
        let compositor = compositor(storage.clone());

        for region in [Region::new(150, 150, 20, 20), Region::new(10, 10, 0, 20), Region::new(-30, 10, 20, 20)] {
            let err = compositor.apply(&page, &EditRequest::new(region, "x")).unwrap_err();
            assert_eq!(err.kind(), "invalid_region");
        }
        assert_eq!(storage.load_page(&page).unwrap(), original);
    }

    #[test]
    fn test_invalid_fill_colour_rejected_before_mutation() {
        let original = gradient(100, 100);
        let (storage, page) = setup(original.clone());
        let compositor = compositor(storage.clone());

        let request = edit(0, 0, "x").with_fill(FillStrategy::BorderAverage).with_fill_color("teal");
        assert_eq!(compositor.apply(&page, &request).unwrap_err().kind(), "invalid_edit");
        assert_eq!(storage.load_page(&page).unwrap(), original);
    }

    #[test]
    fn test_percent_font_size_reported() {
        let (storage, page) = setup(gradient(400, 100));
        let compositor = compositor(storage);

        let request = EditRequest::new(Region::new(10, 10, 200, 10), "Hi").with_fill(FillStrategy::BorderAverage);
        assert_eq!(compositor.apply(&page, &request).unwrap().font_size(), 10);
        let result = compositor.apply(&page, &request.with_font_size_percent(150.0)).unwrap();
        assert_eq!(result.font_size(), 12);
    }

    #[test]
    fn test_oversized_font_is_capped_to_page() {
        let (storage, page) = setup(gradient(300, 200));
        let compositor = compositor(storage.clone());
        let request = EditRequest::new(Region::new(10, 10, 120, 40), "Total")
            .with_fill(FillStrategy::BorderAverage)
            .with_font_size(40_000);

        let result = compositor.apply(&page, &request).unwrap();
        assert_eq!(result.font_size(), 400);

        let result = compositor
            .apply(&page, &request.with_font_size(u32::MAX))
            .unwrap();
        assert_eq!(result.font_size(), 400);
        assert_eq!(storage.load_page(&page).unwrap(), result.image);
    }

    #[test]
    fn test_font_resolution_reported() {
        let (storage, page) = setup(gradient(200, 100));
        let compositor = compositor(storage);
        let request = edit(0, 0, "x").with_font("Unknown Sans").with_style(true, true);
        let result = compositor.apply(&page, &request).unwrap();
        assert_eq!(result.applied.font.file, "Roboto-Italic.ttf");
    }

    #[test]
    fn test_text_is_drawn_in_region() {
        let white = Rgb([255, 255, 255]);
        let (storage, page) = setup(RgbImage::from_pixel(300, 100, white));
        let compositor = compositor(storage);

        let request = EditRequest::new(Region::new(100, 30, 120, 40), "Total")
            .with_fill(FillStrategy::BorderAverage)
            .with_text_color("#000");
        let result = compositor.apply(&page, &request).unwrap();

        let mut inked = 0;
        for (x, y, pixel) in result.image.enumerate_pixels() {
            if *pixel != white {
                assert!((100..220).contains(&x) && (30..70).contains(&y));
                inked += 1;
            }
        }
        assert!(inked > 0);
    }

    #[test]
    fn test_parallel_pages() {
        let storage = Arc::new(MemoryStorage::new());
        let pages: Vec<PageId> = (0..4).map(|i| PageId::new("session", i)).collect();
        for page in &pages {
            storage.insert_page(page.clone(), gradient(120, 80));
        }
        let compositor = compositor(storage.clone());

        std::thread::scope(|scope| {
            for page in &pages {
                let compositor = compositor.clone();
                scope.spawn(move || {
                    for i in 0..3 {
                        compositor.apply(page, &edit(i * 10, i * 5, "page")).unwrap();
                    }
                });
            }
        });

        for page in &pages {
            assert_eq!(storage.load_backup(page).unwrap(), gradient(120, 80));
            assert_ne!(storage.load_page(page).unwrap(), gradient(120, 80));
        }
    }
}
