//! Performance and fairness metrics

mod parity;
mod roc;
mod summary;

pub use parity::{fairness_proxy_auc, strong_demographic_parity_score, ParityScore};
pub use roc::{roc_auc_or_chance, roc_auc_score, CHANCE_AUC};
pub use summary::{nan_mean, nan_std};
