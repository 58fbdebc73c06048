//! Read-only view of the upstream sources feeding one generation run.

use crate::{
    config::AttributeDefaults,
    error::GenResult,
    types::{SubscriptionId, UserId},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRow {
    pub user_id: UserId,
    pub signup_date: NaiveDate,
}

/// Latent attributes as stored; any of them may be missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAttributes {
    pub user_id: UserId,
    pub usage_score: Option<f64>,
    pub nps_score: Option<f64>,
    pub base_mrr: Option<f64>,
}

/// A user with every latent attribute resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSnapshot {
    pub user_id: UserId,
    pub signup_date: NaiveDate,
    pub usage_score: f64,
    pub nps_score: f64,
    pub base_mrr: f64,
}

/// A subscription joined to its plan price. `end_date = None` means active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionSnapshot {
    pub subscription_id: SubscriptionId,
    pub user_id: UserId,
    pub plan_id: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub status: String,
    pub monthly_price: f64,
}

/// The three upstream projections. Pure reads, as of call time.
pub trait SourceReader {
    fn users(&self) -> GenResult<Vec<UserRow>>;
    fn user_attributes(&self) -> GenResult<Vec<UserAttributes>>;
    fn subscriptions(&self) -> GenResult<Vec<SubscriptionSnapshot>>;
}

/// Everything the generator needs, loaded fresh for each run.
#[derive(Debug, Clone, Default)]
pub struct SourceSnapshot {
    pub users: Vec<UserSnapshot>,
    pub subscriptions: Vec<SubscriptionSnapshot>,
}

/// Left-join attributes onto users. Gaps take the configured defaults so
/// users without an attribute row still participate.
pub fn merge_attributes(
    users: Vec<UserRow>,
    attributes: Vec<UserAttributes>,
    defaults: &AttributeDefaults,
) -> Vec<UserSnapshot> {
    let mut by_user: HashMap<UserId, UserAttributes> = attributes
        .into_iter()
        .map(|a| (a.user_id.clone(), a))
        .collect();

    users
        .into_iter()
        .map(|u| {
            let attrs = by_user.remove(&u.user_id);
            let pick = |f: fn(&UserAttributes) -> Option<f64>, fallback: f64| {
                attrs.as_ref().and_then(f).unwrap_or(fallback)
            };
            UserSnapshot {
                usage_score: pick(|a| a.usage_score, defaults.usage_score),
                nps_score: pick(|a| a.nps_score, defaults.nps_score),
                base_mrr: pick(|a| a.base_mrr, defaults.base_mrr),
                user_id: u.user_id,
                signup_date: u.signup_date,
            }
        })
        .collect()
}

pub fn read_snapshot(
    reader: &dyn SourceReader,
    defaults: &AttributeDefaults,
) -> GenResult<SourceSnapshot> {
    let users = reader.users()?;
    let attributes = reader.user_attributes()?;
    let subscriptions = reader.subscriptions()?;
    log::debug!(
        "source: {} users, {} attribute rows, {} subscriptions",
        users.len(),
        attributes.len(),
        subscriptions.len()
    );
    Ok(SourceSnapshot {
        users: merge_attributes(users, attributes, defaults),
        subscriptions,
    })
}

/// Fixture-backed reader for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    pub users: Vec<UserRow>,
    pub attributes: Vec<UserAttributes>,
    pub subscriptions: Vec<SubscriptionSnapshot>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user_id: &str, signup_date: NaiveDate, usage: f64, nps: f64) -> Self {
        self.users.push(UserRow {
            user_id: user_id.into(),
            signup_date,
        });
        self.attributes.push(UserAttributes {
            user_id: user_id.into(),
            usage_score: Some(usage),
            nps_score: Some(nps),
            base_mrr: Some(0.0),
        });
        self
    }

    /// A user with no attribute row at all.
    pub fn with_bare_user(mut self, user_id: &str, signup_date: NaiveDate) -> Self {
        self.users.push(UserRow {
            user_id: user_id.into(),
            signup_date,
        });
        self
    }

    /// An active monthly subscription for `user_id`, id `sub_<user_id>`.
    pub fn with_subscription(mut self, user_id: &str, start_date: NaiveDate, price: f64) -> Self {
        self.subscriptions.push(SubscriptionSnapshot {
            subscription_id: format!("sub_{user_id}"),
            user_id: user_id.into(),
            plan_id: "pro_m".into(),
            start_date,
            end_date: None,
            status: "active".into(),
            monthly_price: price,
        });
        self
    }
}

impl SourceReader for StaticSource {
    fn users(&self) -> GenResult<Vec<UserRow>> {
        Ok(self.users.clone())
    }

    fn user_attributes(&self) -> GenResult<Vec<UserAttributes>> {
        Ok(self.attributes.clone())
    }

    fn subscriptions(&self) -> GenResult<Vec<SubscriptionSnapshot>> {
        Ok(self.subscriptions.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 6, 1).unwrap()
    }

    #[test]
    fn missing_attributes_take_defaults() {
        let users = vec![
            UserRow { user_id: "u1".into(), signup_date: day() },
            UserRow { user_id: "u2".into(), signup_date: day() },
        ];
        let attrs = vec![UserAttributes {
            user_id: "u1".into(),
            usage_score: Some(88.0),
            nps_score: None,
            base_mrr: Some(120.0),
        }];
        let merged = merge_attributes(users, attrs, &AttributeDefaults::default());

        assert_eq!(merged[0].usage_score, 88.0);
        assert_eq!(merged[0].nps_score, 7.0);
        assert_eq!(merged[0].base_mrr, 120.0);
        assert_eq!(merged[1].usage_score, 50.0);
        assert_eq!(merged[1].nps_score, 7.0);
        assert_eq!(merged[1].base_mrr, 0.0);
    }

    #[test]
    fn attributes_for_unknown_users_are_dropped() {
        let users = vec![UserRow { user_id: "u1".into(), signup_date: day() }];
        let attrs = vec![UserAttributes {
            user_id: "ghost".into(),
            usage_score: Some(1.0),
            nps_score: Some(1.0),
            base_mrr: None,
        }];
        let merged = merge_attributes(users, attrs, &AttributeDefaults::default());
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].user_id, "u1");
    }
}
