#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the capa persistence service, e.g. `http://localhost:8081/api/capas`
    pub capas_url: String,
    /// Base URL of the graphics service, e.g. `http://localhost:8081/api/graphics`
    pub graphics_url: String,
    pub map: MapConfig,
    pub thematic: ThematicConfig,
}

#[derive(Debug, Clone)]
pub struct MapConfig {
    /// Initial camera center as (longitude, latitude)
    pub center: (f64, f64),
    pub zoom: f64,
    pub style_url: String,
}

/// Vendor tileset wiring for the fixed thematic overlays. The source-layer
/// names are an external contract the vendor can rename under us, so they
/// are configuration rather than constants.
#[derive(Debug, Clone)]
pub struct ThematicConfig {
    pub desigualdad_source_layer: String,
    pub vial_source_layer: String,
    pub edificios_source_layer: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            capas_url: "http://localhost:8081/api/capas".to_string(),
            graphics_url: "http://localhost:8081/api/graphics".to_string(),
            map: MapConfig::default(),
            thematic: ThematicConfig::default(),
        }
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        MapConfig {
            center: (-96.1102, 19.1601),
            zoom: 12.0,
            style_url: "mapbox://styles/daffi/cmgb6w2zg000b01qp3e315yw8".to_string(),
        }
    }
}

impl Default for ThematicConfig {
    fn default() -> Self {
        ThematicConfig {
            desigualdad_source_layer: "m3007veracruz-bq1px0".to_string(),
            vial_source_layer: "RNC2021_Veracruz-0dd0d8".to_string(),
            edificios_source_layer: "building".to_string(),
        }
    }
}
