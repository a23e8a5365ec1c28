use crate::models::capa::{CapaKind, CapaParsed};
use crate::models::overlay::Overlay;

/// Application-state side of the reconciler: owns the "show saved layers"
/// toggle and the loaded capa records, and derives the desired overlay list
/// from them: one overlay per capa kind, painted with the kind's palette
/// entry.
///
/// The derived list is rebuilt only when state changes, so between changes
/// `desired()` hands out the same feature `Arc`s and a reconciliation pass
/// against an unchanged registry is free.
pub struct OverlayRegistry {
    show_saved: bool,
    capas: Vec<CapaParsed>,
    desired: Vec<Overlay>,
}

impl OverlayRegistry {
    pub fn new() -> Self {
        OverlayRegistry {
            show_saved: false,
            capas: Vec::new(),
            desired: Vec::new(),
        }
    }

    pub fn show_saved(&self) -> bool {
        self.show_saved
    }

    pub fn set_show_saved(&mut self, show: bool) {
        if self.show_saved != show {
            self.show_saved = show;
            self.rebuild();
        }
    }

    pub fn set_capas(&mut self, capas: Vec<CapaParsed>) {
        self.capas = capas;
        self.rebuild();
    }

    pub fn remove_capa(&mut self, id: i64) {
        let before = self.capas.len();
        self.capas.retain(|c| c.id != id);
        if self.capas.len() != before {
            self.rebuild();
        }
    }

    pub fn capas(&self) -> &[CapaParsed] {
        &self.capas
    }

    /// The overlay list the map should currently be showing.
    pub fn desired(&self) -> &[Overlay] {
        &self.desired
    }

    fn rebuild(&mut self) {
        self.desired.clear();
        if !self.show_saved {
            return;
        }
        for kind in CapaKind::ALL {
            let features: Vec<_> = self
                .capas
                .iter()
                .filter(|c| c.kind == kind)
                .flat_map(|c| c.features.iter().cloned())
                .collect();
            self.desired
                .push(Overlay::new(kind.as_str(), features).with_style(kind.paint()));
        }
    }
}

impl Default for OverlayRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geojson::{Feature, Geometry, Value as GeomValue};
    use std::sync::Arc;

    fn capa(id: i64, kind: CapaKind, n_features: usize) -> CapaParsed {
        let feature = Feature {
            bbox: None,
            geometry: Some(Geometry::new(GeomValue::Polygon(vec![vec![
                vec![0.0, 0.0],
                vec![1.0, 0.0],
                vec![1.0, 1.0],
                vec![0.0, 0.0],
            ]]))),
            id: None,
            properties: None,
            foreign_members: None,
        };
        CapaParsed {
            id,
            kind,
            features: vec![feature; n_features],
            created_at: None,
        }
    }

    #[test]
    fn hidden_saved_layers_mean_no_desired_overlays() {
        let mut registry = OverlayRegistry::new();
        registry.set_capas(vec![capa(1, CapaKind::Pob, 2)]);
        assert!(registry.desired().is_empty());
    }

    #[test]
    fn groups_features_of_the_same_kind_into_one_overlay() {
        let mut registry = OverlayRegistry::new();
        registry.set_show_saved(true);
        registry.set_capas(vec![
            capa(1, CapaKind::Pob, 2),
            capa(2, CapaKind::Pob, 1),
            capa(3, CapaKind::Green, 1),
        ]);

        let desired = registry.desired();
        assert_eq!(desired.len(), CapaKind::ALL.len());
        let pob = desired.iter().find(|o| o.id == "pob").unwrap();
        assert_eq!(pob.features.len(), 3);
        assert_eq!(pob.style.fill_colour(), CapaKind::Pob.colour());
        let green = desired.iter().find(|o| o.id == "green").unwrap();
        assert_eq!(green.features.len(), 1);
    }

    #[test]
    fn desired_list_is_stable_between_state_changes() {
        let mut registry = OverlayRegistry::new();
        registry.set_show_saved(true);
        registry.set_capas(vec![capa(1, CapaKind::Pob, 1)]);

        let first = Arc::clone(&registry.desired()[0].features);
        let second = Arc::clone(&registry.desired()[0].features);
        assert!(Arc::ptr_eq(&first, &second));

        registry.remove_capa(1);
        let third = Arc::clone(&registry.desired()[0].features);
        assert!(!Arc::ptr_eq(&first, &third));
    }

    #[test]
    fn removing_a_missing_capa_does_not_rebuild() {
        let mut registry = OverlayRegistry::new();
        registry.set_show_saved(true);
        registry.set_capas(vec![capa(1, CapaKind::Pob, 1)]);
        let before = Arc::clone(&registry.desired()[0].features);
        registry.remove_capa(99);
        assert!(Arc::ptr_eq(&before, &registry.desired()[0].features));
    }
}
