pub(crate) mod city_banners;
pub(crate) mod sub_system_dock;
pub(crate) mod yields_lens;

pub(crate) use city_banners::CityBanners;
pub(crate) use sub_system_dock::SubSystemDock;
pub(crate) use yields_lens::YieldsLens;
