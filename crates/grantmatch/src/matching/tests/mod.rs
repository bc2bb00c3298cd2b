mod common;
mod eligibility;
mod fetcher;
