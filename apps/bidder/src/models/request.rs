//! Inbound auction request wire types.
//!
//! A pragmatic subset of the OpenRTB request object: enough structure to
//! derive targeting terms and bid floors. Unknown fields are ignored on
//! deserialization.

use serde::{Deserialize, Serialize};

use crate::models::campaign::{Target, TargetType};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BidRequest {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imp: Vec<Imp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<App>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site: Option<Site>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<Device>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct App {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub bundle: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Site {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub domain: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Device {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub os: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub osv: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ua: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ip: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo: Option<Geo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Geo {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub country: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub region: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub city: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Imp {
    #[serde(default)]
    pub id: String,
    /// Minimum acceptable CPM in dollars.
    #[serde(default)]
    pub bidfloor: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner: Option<Banner>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tagid: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Banner {
    #[serde(default)]
    pub w: i32,
    #[serde(default)]
    pub h: i32,
    #[serde(default)]
    pub pos: i32,
}

impl BidRequest {
    /// Request-level targeting terms, derived once per request.
    ///
    /// At most one placement target is produced; an app name wins over a
    /// site name when both are present.
    pub fn targeting(&self) -> Vec<Target> {
        let mut targets = Vec::with_capacity(3);

        if let Some(device) = &self.device {
            if let Some(geo) = &device.geo {
                if !geo.country.is_empty() {
                    targets.push(Target::new(TargetType::Country, geo.country.clone()));
                }
            }
            if !device.os.is_empty() {
                targets.push(Target::new(TargetType::Os, device.os.clone()));
            }
        }

        if let Some(app) = self.app.as_ref().filter(|a| !a.name.is_empty()) {
            targets.push(Target::new(TargetType::Placement, app.name.clone()));
        } else if let Some(site) = self.site.as_ref().filter(|s| !s.name.is_empty()) {
            targets.push(Target::new(TargetType::Placement, site.name.clone()));
        }

        targets
    }
}

impl Imp {
    /// Impression-level targeting terms: the creative size, when known.
    pub fn targeting(&self) -> Vec<Target> {
        let mut targets = Vec::with_capacity(1);

        if let Some(banner) = &self.banner {
            if banner.w != 0 && banner.h != 0 {
                targets.push(Target::new(
                    TargetType::CreativeSize,
                    format!("{}x{}", banner.w, banner.h),
                ));
            }
        }

        targets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_country_os_and_app_placement() {
        let request = BidRequest {
            device: Some(Device {
                os: "Android".into(),
                geo: Some(Geo {
                    country: "US".into(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            app: Some(App {
                name: "Words With Enemies".into(),
                ..Default::default()
            }),
            site: Some(Site {
                name: "example.com".into(),
                ..Default::default()
            }),
            ..Default::default()
        };

        let targets = request.targeting();
        assert_eq!(
            targets,
            vec![
                Target::new(TargetType::Country, "US"),
                Target::new(TargetType::Os, "Android"),
                Target::new(TargetType::Placement, "Words With Enemies"),
            ]
        );
    }

    #[test]
    fn site_placement_used_when_no_app() {
        let request = BidRequest {
            site: Some(Site {
                name: "example.com".into(),
                ..Default::default()
            }),
            ..Default::default()
        };

        let targets = request.targeting();
        assert_eq!(targets, vec![Target::new(TargetType::Placement, "example.com")]);
    }

    #[test]
    fn empty_fields_derive_nothing() {
        let request = BidRequest {
            device: Some(Device::default()),
            app: Some(App::default()),
            ..Default::default()
        };
        assert!(request.targeting().is_empty());
    }

    #[test]
    fn creative_size_needs_both_dimensions() {
        let imp = Imp {
            banner: Some(Banner {
                w: 320,
                h: 50,
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(
            imp.targeting(),
            vec![Target::new(TargetType::CreativeSize, "320x50")]
        );

        let partial = Imp {
            banner: Some(Banner {
                w: 320,
                h: 0,
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(partial.targeting().is_empty());
    }

    #[test]
    fn parses_a_sparse_request() {
        let json = serde_json::json!({
            "id": "req-1",
            "imp": [{ "id": "1", "bidfloor": 0.10 }],
            "device": { "os": "iOS" }
        });
        let request: BidRequest = serde_json::from_value(json).unwrap();
        assert_eq!(request.id, "req-1");
        assert_eq!(request.imp.len(), 1);
        assert_eq!(request.imp[0].bidfloor, 0.10);
        assert_eq!(request.targeting(), vec![Target::new(TargetType::Os, "iOS")]);
    }
}
