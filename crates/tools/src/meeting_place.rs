//! Meeting place tool: recommend venues that suit everyone in a group.
//!
//! Each participant's location is placed on the map, the meeting point is
//! the mean of those coordinates, and venues within [`SEARCH_RADIUS_M`] of
//! it are ranked by rating, closeness and the group's stated requirements.
//! Geocoding and venue search are deterministic and offline.

use async_trait::async_trait;
use serde::Serialize;
use stepwise_core::error::ToolError;
use stepwise_core::tool::{Tool, ToolResult};

/// Venues farther than this from the meeting point are not considered.
pub const SEARCH_RADIUS_M: f64 = 2000.0;

/// How many venues a recommendation lists at most.
pub const MAX_RECOMMENDATIONS: usize = 5;

pub const DEFAULT_KEYWORDS: &str = "cafe";

// Planar approximation, accurate enough inside one city.
const METERS_PER_DEG_LNG: f64 = 85_000.0;
const METERS_PER_DEG_LAT: f64 = 111_000.0;

const CANDIDATES: u64 = 12;
const CITY_CENTER: Coordinate = Coordinate {
    lng: 116.397,
    lat: 39.909,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    pub lng: f64,
    pub lat: f64,
}

/// Arithmetic mean of `points`; `None` when there are none.
pub fn center_point(points: &[Coordinate]) -> Option<Coordinate> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    Some(Coordinate {
        lng: points.iter().map(|p| p.lng).sum::<f64>() / n,
        lat: points.iter().map(|p| p.lat).sum::<f64>() / n,
    })
}

/// Distance in meters between two points.
pub fn distance_m(a: Coordinate, b: Coordinate) -> f64 {
    let x = (b.lng - a.lng) * METERS_PER_DEG_LNG;
    let y = (b.lat - a.lat) * METERS_PER_DEG_LAT;
    (x * x + y * y).sqrt()
}

/// Something a group may ask a venue to offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Amenity {
    Parking,
    Quiet,
    Business,
    Transit,
}

impl Amenity {
    const ALL: [Amenity; 4] = [Amenity::Parking, Amenity::Quiet, Amenity::Business, Amenity::Transit];

    fn cues(self) -> &'static [&'static str] {
        match self {
            Amenity::Parking => &["parking", "car park", "garage"],
            Amenity::Quiet => &["quiet", "calm", "atmosphere", "ambience"],
            Amenity::Business => &["business", "meeting", "office", "work"],
            Amenity::Transit => &["transit", "subway", "metro", "bus stop", "station", "train"],
        }
    }

    fn label(self) -> &'static str {
        match self {
            Amenity::Parking => "parking",
            Amenity::Quiet => "quiet",
            Amenity::Business => "business",
            Amenity::Transit => "transit",
        }
    }
}

/// Amenities a free-text requirement asks for.
pub fn priorities(requirements: &str) -> Vec<Amenity> {
    let text = requirements.to_lowercase();
    Amenity::ALL
        .into_iter()
        .filter(|a| a.cues().iter().any(|cue| text.contains(cue)))
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct Venue {
    pub name: String,
    pub address: String,
    pub location: Coordinate,
    pub rating: f64,
    pub amenities: Vec<Amenity>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedVenue {
    #[serde(flatten)]
    pub venue: Venue,
    pub distance_m: f64,
    pub score: f64,
}

/// Rating (up to 50), closeness (20 at the meeting point, 0 at the search
/// radius) and 10 per requested amenity the venue has.
pub fn score(venue: &Venue, center: Coordinate, wanted: &[Amenity]) -> f64 {
    let rating = venue.rating * 10.0;
    let closeness = (20.0 * (1.0 - distance_m(center, venue.location) / SEARCH_RADIUS_M)).max(0.0);
    let matched = wanted.iter().filter(|a| venue.amenities.contains(*a)).count();
    rating + closeness + 10.0 * matched as f64
}

/// Best [`MAX_RECOMMENDATIONS`] venues, highest score first. Ties go to
/// the alphabetically first name.
pub fn rank(venues: Vec<Venue>, center: Coordinate, wanted: &[Amenity]) -> Vec<RankedVenue> {
    let mut ranked: Vec<RankedVenue> = venues
        .into_iter()
        .map(|venue| RankedVenue {
            distance_m: distance_m(center, venue.location),
            score: score(&venue, center, wanted),
            venue,
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.venue.name.cmp(&b.venue.name))
    });
    ranked.truncate(MAX_RECOMMENDATIONS);
    ranked
}

fn hash(text: &str) -> u64 {
    text.bytes()
        .fold(0xcbf2_9ce4_8422_2325u64, |acc, b| (acc ^ b as u64).wrapping_mul(0x0100_0000_01b3))
}

fn mix(seed: u64) -> u64 {
    let mut z = seed.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Place a location description within about 15 km of the city center.
/// The same description (ignoring case and outer whitespace) always lands
/// on the same point.
pub fn geocode(place: &str) -> Coordinate {
    let h = mix(hash(&place.trim().to_lowercase()));
    let offset = |bits: u64| (bits % 30_001) as f64 / 100_000.0 - 0.15;
    Coordinate {
        lng: CITY_CENTER.lng + offset(h),
        lat: CITY_CENTER.lat + offset(h >> 20),
    }
}

/// Venues matching `keywords` within the search radius of `center`.
fn search_venues(center: Coordinate, keywords: &str) -> Vec<Venue> {
    const PREFIXES: [&str; 8] = ["Harbor", "Lantern", "Maple", "Corner", "Oak & Ember", "Bluebird", "Granite", "Willow"];
    const STREETS: [&str; 6] = ["Station", "Garden", "Market", "Riverside", "Chapel", "Union"];

    let keywords = keywords.trim().to_lowercase();
    let kind = match keywords.chars().next() {
        Some(first) => first.to_uppercase().chain(keywords.chars().skip(1)).collect(),
        None => String::new(),
    };
    let seed = hash(&format!("{:.4},{:.4}|{keywords}", center.lng, center.lat));

    (0..CANDIDATES)
        .map(|i| {
            let h = mix(seed.wrapping_add(i));
            let angle = ((h % 360) as f64).to_radians();
            let radius = ((h >> 9) % SEARCH_RADIUS_M as u64) as f64;
            let amenities = Amenity::ALL
                .into_iter()
                .enumerate()
                .filter(|(k, _)| (h >> (32 + k)) & 1 == 1)
                .map(|(_, a)| a)
                .collect();

            Venue {
                name: format!("{} {kind}", PREFIXES[((h >> 40) % PREFIXES.len() as u64) as usize])
                    .trim()
                    .to_string(),
                address: format!(
                    "{} {} Street",
                    (h >> 48) % 300 + 1,
                    STREETS[((h >> 56) % STREETS.len() as u64) as usize]
                ),
                location: Coordinate {
                    lng: center.lng + radius * angle.cos() / METERS_PER_DEG_LNG,
                    lat: center.lat + radius * angle.sin() / METERS_PER_DEG_LAT,
                },
                rating: 3.0 + ((h >> 20) % 21) as f64 / 10.0,
                amenities,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct Participant {
    pub name: String,
    pub location: Coordinate,
    pub distance_to_center_m: f64,
}

/// A complete answer: where everyone is, where to meet, and where to go.
#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub participants: Vec<Participant>,
    pub center: Coordinate,
    pub keywords: String,
    pub requirements: Vec<Amenity>,
    pub places: Vec<RankedVenue>,
}

impl Recommendation {
    pub fn find(locations: &[String], keywords: &str, requirements: &str) -> Result<Self, ToolError> {
        let names: Vec<&str> = locations.iter().map(|l| l.trim()).collect();
        if names.is_empty() {
            return Err(ToolError::InvalidArguments("At least one location is required".into()));
        }
        if names.iter().any(|n| n.is_empty()) {
            return Err(ToolError::InvalidArguments("Locations must not be blank".into()));
        }

        let points: Vec<Coordinate> = names.iter().map(|n| geocode(n)).collect();
        let center = center_point(&points)
            .ok_or_else(|| ToolError::InvalidArguments("At least one location is required".into()))?;

        let keywords = match keywords.trim() {
            "" => DEFAULT_KEYWORDS,
            k => k,
        };
        let wanted = priorities(requirements);
        let places = rank(search_venues(center, keywords), center, &wanted);

        Ok(Self {
            participants: names
                .iter()
                .zip(&points)
                .map(|(name, &location)| Participant {
                    name: name.to_string(),
                    location,
                    distance_to_center_m: distance_m(center, location),
                })
                .collect(),
            center,
            keywords: keywords.to_string(),
            requirements: wanted,
            places,
        })
    }

    pub fn render(&self) -> String {
        if self.places.is_empty() {
            return format!("No {} found near the meeting point.", self.keywords);
        }

        let mut lines = vec![
            format!(
                "Found {} {} near the meeting point ({:.5}, {:.5}).",
                self.places.len(),
                self.keywords,
                self.center.lat,
                self.center.lng
            ),
            String::new(),
            "Participants:".to_string(),
        ];
        for p in &self.participants {
            lines.push(format!(
                "- {}: {:.1} km from the meeting point",
                p.name,
                p.distance_to_center_m / 1000.0
            ));
        }

        lines.push(String::new());
        lines.push("Recommendations:".to_string());
        for (i, place) in self.places.iter().enumerate() {
            lines.push(format!(
                "{}. {} (rating {:.1}, {:.0} m away)",
                i + 1,
                place.venue.name,
                place.venue.rating,
                place.distance_m
            ));
            lines.push(format!("   Address: {}", place.venue.address));
            if !place.venue.amenities.is_empty() {
                let labels: Vec<&str> = place.venue.amenities.iter().map(|a| a.label()).collect();
                lines.push(format!("   Offers: {}", labels.join(", ")));
            }
        }
        lines.join("\n")
    }
}

pub struct MeetingPlaceTool;

#[async_trait]
impl Tool for MeetingPlaceTool {
    fn name(&self) -> &str {
        "meeting_place"
    }

    fn description(&self) -> &str {
        "Recommend places for a group to meet. Finds the point between all participants' locations and ranks nearby venues by rating, distance and the group's requirements."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "locations": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "(required) Where each participant is, one description per person"
                },
                "keywords": {
                    "type": "string",
                    "description": "(optional) Kind of venue to look for",
                    "default": DEFAULT_KEYWORDS
                },
                "user_requirements": {
                    "type": "string",
                    "description": "(optional) Extra needs such as parking, a quiet room or a nearby subway",
                    "default": ""
                }
            },
            "required": ["locations"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let locations = arguments["locations"]
            .as_array()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'locations' argument".into()))?
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| ToolError::InvalidArguments("'locations' must be a list of strings".into()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let keywords = arguments["keywords"].as_str().unwrap_or(DEFAULT_KEYWORDS);
        let requirements = arguments["user_requirements"].as_str().unwrap_or("");

        let recommendation = Recommendation::find(&locations, keywords, requirements)?;
        let data = serde_json::to_value(&recommendation).map_err(|e| ToolError::ExecutionFailed {
            tool_name: "meeting_place".into(),
            reason: e.to_string(),
        })?;

        Ok(ToolResult::success(recommendation.render()).with_data(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(lng: f64, lat: f64) -> Coordinate {
        Coordinate { lng, lat }
    }

    fn venue(name: &str, location: Coordinate, rating: f64, amenities: Vec<Amenity>) -> Venue {
        Venue {
            name: name.into(),
            address: "1 Test Street".into(),
            location,
            rating,
            amenities,
        }
    }

    #[test]
    fn center_is_the_mean() {
        assert_eq!(center_point(&[at(0.0, 0.0), at(2.0, 4.0)]), Some(at(1.0, 2.0)));
        assert_eq!(center_point(&[at(116.3, 39.9)]), Some(at(116.3, 39.9)));
        assert_eq!(center_point(&[]), None);
    }

    #[test]
    fn distance_is_planar_meters() {
        assert!((distance_m(at(0.0, 0.0), at(1.0, 0.0)) - 85_000.0).abs() < 1e-6);
        assert!((distance_m(at(0.0, 0.0), at(0.0, 1.0)) - 111_000.0).abs() < 1e-6);
        let b = at(300.0 / 85_000.0, 400.0 / 111_000.0);
        assert!((distance_m(at(0.0, 0.0), b) - 500.0).abs() < 1e-6);
    }

    #[test]
    fn requirements_map_to_amenities() {
        assert_eq!(
            priorities("Somewhere QUIET with parking, close to the subway"),
            vec![Amenity::Parking, Amenity::Quiet, Amenity::Transit]
        );
        assert!(priorities("").is_empty());
    }

    #[test]
    fn score_combines_rating_closeness_and_requirements() {
        let center = at(0.0, 0.0);
        let here = venue("A", center, 4.5, vec![Amenity::Parking]);
        assert!((score(&here, center, &[]) - 65.0).abs() < 1e-9);
        assert!((score(&here, center, &[Amenity::Parking, Amenity::Quiet]) - 75.0).abs() < 1e-9);

        let far = venue("B", at(3000.0 / 85_000.0, 0.0), 4.0, vec![]);
        assert!((score(&far, center, &[]) - 40.0).abs() < 1e-9);

        let halfway = venue("C", at(1000.0 / 85_000.0, 0.0), 4.0, vec![]);
        assert!((score(&halfway, center, &[]) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn ranking_keeps_the_best_five() {
        let center = at(0.0, 0.0);
        let venues: Vec<Venue> = (0..7)
            .map(|i| venue(&format!("V{i}"), center, 3.0 + i as f64 * 0.2, vec![]))
            .collect();

        let ranked = rank(venues, center, &[]);

        assert_eq!(ranked.len(), MAX_RECOMMENDATIONS);
        let names: Vec<&str> = ranked.iter().map(|r| r.venue.name.as_str()).collect();
        assert_eq!(names, vec!["V6", "V5", "V4", "V3", "V2"]);
    }

    #[test]
    fn requirements_can_outrank_rating() {
        let center = at(0.0, 0.0);
        let ranked = rank(
            vec![
                venue("Popular", center, 4.8, vec![]),
                venue("Has parking", center, 4.2, vec![Amenity::Parking]),
            ],
            center,
            &priorities("need parking"),
        );
        assert_eq!(ranked[0].venue.name, "Has parking");
    }

    #[test]
    fn geocoding_is_stable() {
        assert_eq!(geocode("Central Station"), geocode("  central station "));
        assert_ne!(geocode("Central Station"), geocode("Airport"));
        let p = geocode("anywhere");
        assert!((p.lng - CITY_CENTER.lng).abs() <= 0.15 + 1e-9);
        assert!((p.lat - CITY_CENTER.lat).abs() <= 0.15 + 1e-9);
    }

    #[test]
    fn recommendation_stays_within_radius() {
        let locations = vec!["Central Station".to_string(), "Old Town".to_string()];
        let rec = Recommendation::find(&locations, "", "quiet").unwrap();

        assert_eq!(rec.keywords, DEFAULT_KEYWORDS);
        assert_eq!(rec.participants.len(), 2);
        assert_eq!(rec.places.len(), MAX_RECOMMENDATIONS);
        assert!(rec.places.iter().all(|p| p.distance_m <= SEARCH_RADIUS_M));
        assert!(rec.places.windows(2).all(|w| w[0].score >= w[1].score));
        assert!(rec.render().starts_with("Found 5 cafe near the meeting point"));
    }

    #[test]
    fn blank_locations_are_rejected() {
        assert!(matches!(
            Recommendation::find(&[], "cafe", ""),
            Err(ToolError::InvalidArguments(_))
        ));
        assert!(matches!(
            Recommendation::find(&["home".into(), "  ".into()], "cafe", ""),
            Err(ToolError::InvalidArguments(_))
        ));
    }

    #[tokio::test]
    async fn execute_returns_text_and_data() {
        let result = MeetingPlaceTool
            .execute(serde_json::json!({
                "locations": ["Harbor Bridge", "University"],
                "keywords": "tea house",
                "user_requirements": "somewhere for a business meeting"
            }))
            .await
            .unwrap();

        assert!(result.success);
        assert!(result.output.contains("Recommendations:"));
        let data = result.data.unwrap();
        assert_eq!(data["places"].as_array().unwrap().len(), MAX_RECOMMENDATIONS);
        assert_eq!(data["requirements"], serde_json::json!(["business"]));
    }

    #[tokio::test]
    async fn execute_rejects_non_string_locations() {
        let result = MeetingPlaceTool
            .execute(serde_json::json!({ "locations": ["home", 42] }))
            .await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }
}
