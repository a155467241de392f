//! Model training module
//!
//! Two interchangeable boosted-tree classifiers behind one dispatcher:
//! - XGBoost-style level-wise growth (`xgb`)
//! - LightGBM-style leaf-wise growth with early stopping (`lgbm`)
//!
//! Both record per-round metrics under their library's native names; the
//! [`history`] adapters turn those into one shared layout.

mod dispatcher;
mod model;
pub mod early_stopping;
pub mod history;
pub mod lightgbm;
pub mod objective;
pub mod xgboost;

pub use dispatcher::{
    train_test_split, DispatchResult, HeldOut, Hyperparameters, TrainTestSplit, TrainingDispatcher,
};
pub use early_stopping::EarlyStopping;
pub use history::{
    EvalsResult, HistoryAdapter, LightGBMHistory, TrainingHistory, XGBoostHistory, ERROR, LOGLOSS,
    TRAIN_SPLIT, VALIDATION_SPLIT,
};
pub use lightgbm::{LightGBMClassifier, LightGBMConfig};
pub use model::{Backend, Booster, TrainedModel};
pub use objective::{EvalSet, Objective};
pub use xgboost::{XGBoostClassifier, XGBoostConfig};
