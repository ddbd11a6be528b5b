// Domain layer: series and forecast models, calendar rules, ports (interfaces) and the
// cleaning services. Nothing in here touches the file system directly.

pub mod calendar;
pub mod model;
pub mod ports;

pub mod services;
