//! Match-outcome forecasting and bookmaker-odds value screening for one
//! league's scoring environment.
//!
//! The engine is three pure layers over a profile pool rebuilt from match
//! history on every run: Elo-style ratings ([`ratings`]), a Poisson scoreline
//! model with a consistency reconciliation pass ([`predict`]), and
//! expected-value scoring against market prices ([`value`]). Everything that
//! touches the network or disk lives at the edges ([`dataset`], [`odds`],
//! [`export`]) and hands the engine plain records.

pub mod analysis;
pub mod config;
pub mod dataset;
pub mod export;
pub mod http_client;
pub mod metrics;
pub mod odds;
pub mod predict;
pub mod ratings;
pub mod select;
pub mod value;
