use itertools::Itertools;
use regex::Regex;
use serde::Serialize;
use shrinkwraprs::Shrinkwrap;

use crate::errors::{PdsError, Result};

/// Rule that produced a catalog's band order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CatalogOrder {
    /// Declared band table order.
    Canonical,
    /// Order of the assets in a per-scene manifest.
    Manifest,
}

/// Ordered, duplicate-free band names valid for one scene.
#[derive(Shrinkwrap, Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BandCatalog {
    #[shrinkwrap(main_field)]
    bands: Vec<String>,
    order: CatalogOrder,
}

impl BandCatalog {
    pub fn new<I, S>(bands: I, order: CatalogOrder) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            bands: bands.into_iter().map(Into::into).unique().collect(),
            order,
        }
    }

    /// Catalog from a static band table.
    pub fn from_table(table: &[&str]) -> Self {
        Self::new(table.iter().copied(), CatalogOrder::Canonical)
    }

    /// Catalog built from the asset keys of a scene manifest.
    ///
    /// `canonical` pairs each band with the asset key announcing it. Bands
    /// keep the table order and are kept only when their key is present. If
    /// no table entry matches, manifest keys matching `pattern` are used in
    /// manifest order.
    pub fn from_manifest<S: AsRef<str>>(
        canonical: &[(&str, &str)],
        assets: &[S],
        pattern: &Regex,
    ) -> Self {
        let present = |key: &str| assets.iter().any(|asset| asset.as_ref() == key);
        let canonical = Self::new(
            canonical
                .iter()
                .filter(|(_, key)| present(key))
                .map(|(band, _)| *band),
            CatalogOrder::Canonical,
        );
        if !canonical.is_empty() {
            return canonical;
        }
        Self::new(
            assets
                .iter()
                .map(AsRef::as_ref)
                .filter(|asset| pattern.is_match(asset)),
            CatalogOrder::Manifest,
        )
    }

    /// Append a second group of bands.
    pub fn chain(self, group: &[&str]) -> Self {
        Self::new(
            self.bands.into_iter().chain(group.iter().map(|b| b.to_string())),
            self.order,
        )
    }

    pub fn order(&self) -> CatalogOrder {
        self.order
    }

    pub fn contains(&self, band: &str) -> bool {
        self.bands.iter().any(|valid| valid == band)
    }

    /// Fail with the full catalog when `band` is not part of it.
    pub fn ensure(&self, band: &str) -> Result<()> {
        if self.contains(band) {
            Ok(())
        } else {
            Err(PdsError::InvalidBandName {
                band: band.into(),
                valid: self.bands.clone(),
            })
        }
    }
}
