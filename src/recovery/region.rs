//! Region table: the fixed set of known cities and their canonical
//! coordinates used by virtual-stop generation (spec §4.2 step 4) and hub
//! detection (step 5).

use crate::model::Coordinates;

/// One entry in the region table.
#[derive(Debug, Clone, Copy)]
pub struct RegionCity {
    pub name: &'static str,
    pub lat: f64,
    pub lon: f64,
}

/// ~30 settlements of the served region, with the hub (Yakutsk) first.
/// Coordinates are approximate real-world values for the named towns.
pub const REGION_CITIES: &[RegionCity] = &[
    RegionCity { name: "Якутск", lat: 62.0281, lon: 129.7326 },
    RegionCity { name: "Олёкминск", lat: 60.3725, lon: 120.4264 },
    RegionCity { name: "Мирный", lat: 62.5352, lon: 113.9633 },
    RegionCity { name: "Нерюнгри", lat: 56.6622, lon: 124.7147 },
    RegionCity { name: "Алдан", lat: 58.6039, lon: 125.3894 },
    RegionCity { name: "Покровск", lat: 61.4856, lon: 129.1406 },
    RegionCity { name: "Вилюйск", lat: 63.7553, lon: 121.6239 },
    RegionCity { name: "Верхоянск", lat: 67.5447, lon: 133.3844 },
    RegionCity { name: "Тикси", lat: 71.6872, lon: 128.8694 },
    RegionCity { name: "Нюрба", lat: 63.2867, lon: 118.3500 },
    RegionCity { name: "Сунтар", lat: 62.1436, lon: 117.6319 },
    RegionCity { name: "Чурапча", lat: 61.9886, lon: 132.4328 },
    RegionCity { name: "Усть-Нера", lat: 64.5664, lon: 143.2001 },
    RegionCity { name: "Жатай", lat: 62.1331, lon: 129.6261 },
    RegionCity { name: "Бердигестях", lat: 62.0875, lon: 126.6806 },
    RegionCity { name: "Хандыга", lat: 62.6667, lon: 135.5833 },
    RegionCity { name: "Чокурдах", lat: 70.6228, lon: 147.9075 },
    RegionCity { name: "Батагай", lat: 67.6564, lon: 134.6353 },
    RegionCity { name: "Сангар", lat: 63.9233, lon: 127.4681 },
    RegionCity { name: "Намцы", lat: 62.7119, lon: 129.6667 },
    RegionCity { name: "Амга", lat: 60.9011, lon: 131.9664 },
    RegionCity { name: "Бестях", lat: 61.8156, lon: 129.9081 },
    RegionCity { name: "Хону", lat: 66.4658, lon: 143.2169 },
    RegionCity { name: "Депутатский", lat: 69.3050, lon: 139.9022 },
    RegionCity { name: "Зырянка", lat: 65.7386, lon: 150.8706 },
    RegionCity { name: "Среднеколымск", lat: 67.4500, lon: 153.6833 },
    RegionCity { name: "Верхневилюйск", lat: 63.4500, lon: 120.3167 },
    RegionCity { name: "Витим", lat: 59.4500, lon: 112.5667 },
    RegionCity { name: "Оленёк", lat: 68.5000, lon: 112.4333 },
    RegionCity { name: "Саскылах", lat: 71.9333, lon: 114.0833 },
];

/// Default region-center fallback used when no neighbor coordinate can be
/// interpolated for a stop (spec §4.2 step 1).
pub fn default_region_center() -> Coordinates {
    Coordinates::new(62.0, 129.0)
}

pub fn coordinates_for(city: &RegionCity) -> Coordinates {
    Coordinates::new(city.lat, city.lon)
}
