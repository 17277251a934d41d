//! Aggregates behind the university dashboards: attendance rates and
//! standings, letter grades and GPA, and the search/filter/paginate rules
//! applied to roster lists. Every aggregator is a pure function over records
//! already loaded from CSV or JSON.

pub mod attendance;
pub mod config;
pub mod errors;
pub mod grades;
pub mod import;
pub mod listing;
pub mod models;
pub mod report;
pub mod timetable;
