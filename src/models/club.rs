use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Deserializer, Serialize};

/// Club document ("clubs" collection).
///
/// Other collections reference a club by the hex string of its ObjectId
/// (`clubId`), so joins compare `$toString(_id)` against that string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Club {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub club_name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub banner_image: Option<String>,
    /// Whole currency units; the checkout converts to minor units.
    #[serde(default, deserialize_with = "flexible_f64")]
    pub membership_fee: f64,
    pub manager_email: String,
    /// "pending" at creation; admin review moves it to "approved"/"rejected".
    #[serde(default = "default_status")]
    pub status: String,
    pub created_at: Option<DateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,
}

impl Club {
    pub const COLLECTION: &'static str = "clubs";
    pub const STATUS_PENDING: &'static str = "pending";
    pub const STATUS_APPROVED: &'static str = "approved";
}

fn default_status() -> String {
    Club::STATUS_PENDING.to_string()
}

/// Clients send fees as a number or as a numeric string; coerce the way
/// JS `Number(x)` does (unparseable text becomes NaN, not a 400).
pub(crate) fn flexible_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(f64),
        Text(String),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Num(n) => Ok(n),
        Raw::Text(s) => Ok(s.trim().parse::<f64>().unwrap_or(f64::NAN)),
    }
}

/// Option-valued variant of [`flexible_f64`] for PATCH bodies.
pub(crate) fn flexible_f64_opt<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(f64),
        Text(String),
    }
    Ok(match Option::<Raw>::deserialize(deserializer)? {
        None => None,
        Some(Raw::Num(n)) => Some(n),
        Some(Raw::Text(s)) => Some(s.trim().parse::<f64>().unwrap_or(f64::NAN)),
    })
}

/// POST /clubs body. Status and creation time are forced server-side.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateClubRequest {
    pub club_name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub banner_image: Option<String>,
    #[serde(default, deserialize_with = "flexible_f64")]
    #[schema(value_type = f64)]
    pub membership_fee: f64,
    pub manager_email: String,
}

/// PATCH /clubs/{id} body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClubRequest {
    pub club_name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub banner_image: Option<String>,
    #[serde(default, deserialize_with = "flexible_f64_opt")]
    pub membership_fee: Option<f64>,
}

/// PATCH /clubs/{id}/status body.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UpdateClubStatusRequest {
    pub status: String,
}

/// Club as returned over the API (hex id, RFC 3339 timestamps).
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClubResponse {
    pub id: String,
    pub club_name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub banner_image: Option<String>,
    pub membership_fee: f64,
    pub manager_email: String,
    pub status: String,
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl From<Club> for ClubResponse {
    fn from(club: Club) -> Self {
        ClubResponse {
            id: club.id.map(|id| id.to_hex()).unwrap_or_default(),
            club_name: club.club_name,
            description: club.description,
            category: club.category,
            location: club.location,
            banner_image: club.banner_image,
            membership_fee: club.membership_fee,
            manager_email: club.manager_email,
            status: club.status,
            created_at: club
                .created_at
                .and_then(|dt| dt.try_to_rfc3339_string().ok()),
            updated_at: club
                .updated_at
                .and_then(|dt| dt.try_to_rfc3339_string().ok()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    #[test]
    fn test_membership_fee_accepts_number_or_string() {
        let from_number: Club =
            mongodb::bson::from_document(doc! {
                "clubName": "Chess Club",
                "managerEmail": "a@x.com",
                "membershipFee": 25,
            })
            .unwrap();
        assert_eq!(from_number.membership_fee, 25.0);

        let from_string: Club =
            mongodb::bson::from_document(doc! {
                "clubName": "Chess Club",
                "managerEmail": "a@x.com",
                "membershipFee": "12.5",
            })
            .unwrap();
        assert_eq!(from_string.membership_fee, 12.5);
    }

    #[test]
    fn test_status_defaults_to_pending() {
        let club: Club = mongodb::bson::from_document(doc! {
            "clubName": "Chess Club",
            "managerEmail": "a@x.com",
        })
        .unwrap();
        assert_eq!(club.status, Club::STATUS_PENDING);
        assert_eq!(club.membership_fee, 0.0);
    }

    #[test]
    fn test_unparseable_fee_becomes_nan() {
        let club: Club = mongodb::bson::from_document(doc! {
            "clubName": "Chess Club",
            "managerEmail": "a@x.com",
            "membershipFee": "free",
        })
        .unwrap();
        assert!(club.membership_fee.is_nan());
    }
}
