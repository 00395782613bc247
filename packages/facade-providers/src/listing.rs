//! Radius search against an MLS listing search endpoint.

use std::time::Duration;

use reqwest::{Client, header::ACCEPT};
use serde_json::Value;

use crate::{Error, Result};
use facade_config::ListingProviderConfig;
use facade_domain::{Candidate, Coordinates, StructuralFeatures};

pub const METERS_PER_MILE: f64 = 1_609.344;

pub async fn search(
	cfg: &ListingProviderConfig,
	center: Coordinates,
	radius_m: f64,
) -> Result<Vec<Candidate>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"latitude": center.latitude,
		"longitude": center.longitude,
		"radius": radius_m / METERS_PER_MILE,
		"size": cfg.page_size,
		"active": cfg.active_only,
	});
	let res = client
		.post(url)
		.headers(crate::api_key_headers(&cfg.api_key, &cfg.default_headers)?)
		.header(ACCEPT, "application/json")
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_listing_response(&json)
}

fn parse_listing_response(json: &Value) -> Result<Vec<Candidate>> {
	let data = json.get("data").and_then(Value::as_array).ok_or_else(|| Error::InvalidResponse {
		message: "Listing search response is missing data array.".to_string(),
	})?;

	Ok(data.iter().filter_map(parse_item).collect())
}

fn parse_item(item: &Value) -> Option<Candidate> {
	let listing = item.get("listing").unwrap_or(&Value::Null);
	let property_id = ["listingId", "id"]
		.iter()
		.find_map(|key| item.get(*key).or_else(|| listing.get(*key)).and_then(id_string))?;
	let address = listing.get("address").unwrap_or(&Value::Null);
	let (latitude, longitude) = [address, listing.get("location").unwrap_or(&Value::Null), item]
		.into_iter()
		.find_map(|source| {
			Some((number(source.get("latitude")?)?, number(source.get("longitude")?)?))
		})?;
	let address_line = address
		.get("unparsedAddress")
		.or_else(|| address.get("fullAddress"))
		.and_then(Value::as_str)
		.unwrap_or_default()
		.trim()
		.to_string();
	let media = listing.get("media").unwrap_or(&Value::Null);
	let gallery_image_urls: Vec<String> = media
		.get("photosList")
		.and_then(Value::as_array)
		.map(|photos| photos.iter().filter_map(photo_url).collect())
		.unwrap_or_default();
	let preview_image_url = media
		.get("primaryListingImageUrl")
		.and_then(Value::as_str)
		.filter(|url| !url.trim().is_empty())
		.map(str::to_string)
		.or_else(|| gallery_image_urls.first().cloned());
	let features = parse_features(listing.get("property").unwrap_or(&Value::Null));

	Some(Candidate {
		property_id,
		address_line,
		latitude,
		longitude,
		preview_image_url,
		gallery_image_urls,
		features,
	})
}

fn parse_features(property: &Value) -> StructuralFeatures {
	let property_type = property
		.get("propertyType")
		.or_else(|| property.get("propertySubType"))
		.and_then(Value::as_str)
		.map(str::to_string);
	let stories = ["stories", "storiesTotal", "levels"]
		.iter()
		.find_map(|key| property.get(*key).and_then(number));
	let garage = property.get("garageSpaces").and_then(number).is_some_and(|spaces| spaces > 0.0)
		|| property.get("attachedGarageYN").and_then(Value::as_bool).unwrap_or(false)
		|| strings(property.get("parkingFeatures")).iter().any(|f| contains_ci(f, "garage"));
	let roofs = strings(property.get("roof"));
	let roof_style = roofs
		.iter()
		.find(|roof| contains_ci(roof, "gable"))
		.map(|_| "gable".to_string())
		.or_else(|| roofs.first().map(|roof| roof.to_lowercase()));
	let porch =
		strings(property.get("patioAndPorchFeatures")).iter().any(|f| contains_ci(f, "porch"));

	StructuralFeatures { property_type, stories, garage, roof_style, porch }
}

fn photo_url(photo: &Value) -> Option<String> {
	if let Some(url) = photo.as_str() {
		return Some(url.to_string()).filter(|url| !url.trim().is_empty());
	}

	["highRes", "mediumRes", "lowRes", "url"]
		.iter()
		.find_map(|key| photo.get(*key).and_then(Value::as_str))
		.filter(|url| !url.trim().is_empty())
		.map(str::to_string)
}

fn id_string(value: &Value) -> Option<String> {
	match value {
		Value::String(raw) if !raw.trim().is_empty() => Some(raw.trim().to_string()),
		Value::Number(raw) => Some(raw.to_string()),
		_ => None,
	}
}

fn number(value: &Value) -> Option<f64> {
	match value {
		Value::Number(raw) => raw.as_f64(),
		Value::String(raw) => raw.trim().parse().ok(),
		_ => None,
	}
	.filter(|value: &f64| value.is_finite())
}

/// Accepts either a single string or an array of strings.
fn strings(value: Option<&Value>) -> Vec<String> {
	match value {
		Some(Value::String(raw)) => raw.split(',').map(|part| part.trim().to_string()).collect(),
		Some(Value::Array(items)) =>
			items.iter().filter_map(Value::as_str).map(|item| item.trim().to_string()).collect(),
		_ => Vec::new(),
	}
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
	haystack.to_ascii_lowercase().contains(needle)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn maps_listing_items_to_candidates() {
		let json = serde_json::json!({
			"data": [
				{
					"listingId": 123456,
					"listing": {
						"address": {
							"unparsedAddress": "53 Bridge Street, Lowville, NY 13367",
							"latitude": 43.970837,
							"longitude": "-75.61923"
						},
						"media": {
							"photosList": [
								{
									"highRes": "https://img.example/1-hi.jpg",
									"lowRes": "https://img.example/1-lo.jpg"
								},
								{ "mediumRes": "https://img.example/2-md.jpg" }
							]
						},
						"property": {
							"propertyType": "Residential",
							"stories": "2",
							"garageSpaces": 1,
							"roof": ["Asphalt", "Gable"],
							"patioAndPorchFeatures": ["Covered", "Front Porch"]
						}
					}
				}
			]
		});
		let candidates = parse_listing_response(&json).expect("parse failed");

		assert_eq!(candidates.len(), 1);

		let candidate = &candidates[0];

		assert_eq!(candidate.property_id, "123456");
		assert_eq!(candidate.address_line, "53 Bridge Street, Lowville, NY 13367");
		assert_eq!(candidate.longitude, -75.61923);
		assert_eq!(candidate.preview_image_url.as_deref(), Some("https://img.example/1-hi.jpg"));
		assert_eq!(candidate.gallery_image_urls.len(), 2);
		assert_eq!(candidate.features.stories, Some(2.0));
		assert!(candidate.features.garage);
		assert!(candidate.features.porch);
		assert!(candidate.features.has_gable_roof());
	}

	#[test]
	fn skips_items_without_id_or_coordinates() {
		let json = serde_json::json!({
			"data": [
				{ "listing": { "address": { "latitude": 1.0, "longitude": 2.0 } } },
				{ "listingId": "no-coords", "listing": { "address": {} } },
				{ "id": "root-coords", "latitude": 1.5, "longitude": 2.5 }
			]
		});
		let candidates = parse_listing_response(&json).expect("parse failed");

		assert_eq!(candidates.len(), 1);
		assert_eq!(candidates[0].property_id, "root-coords");
		assert!(candidates[0].preview_image_url.is_none());
	}

	#[test]
	fn rejects_response_without_data() {
		let json = serde_json::json!({ "error": "unauthorized" });

		assert!(parse_listing_response(&json).is_err());
	}
}
