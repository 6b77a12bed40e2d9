//! Apartment listing scout for kleinanzeigen.de: crawl, extract, cache and rank listings
//! against local reference prices.

pub mod cache;
pub mod config;
pub mod crawler;
pub mod enrich;
pub mod error;
pub mod extract;
pub mod models;
pub mod scrapers;
