use serde::Deserialize;

use crate::{error::PollError, model::WeatherReading};

/// What the transport delivered for one request.
#[derive(Debug, Clone, PartialEq)]
pub enum HttpOutcome {
    Response { status: u16, body: String },
    Failure { cause: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResponse {
    /// Station name reported by OpenWeatherMap, used when creating a device.
    pub name: Option<String>,
    pub reading: WeatherReading,
}

#[derive(Debug, Deserialize)]
struct OwmMain {
    temp: Option<f64>,
    humidity: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwmWind {
    speed: Option<f64>,
    deg: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwmCurrentResponse {
    main: Option<OwmMain>,
    wind: Option<OwmWind>,
    name: Option<String>,
}

/// Classify a delivered outcome into a reading or the reason there is none.
pub fn parse(outcome: &HttpOutcome) -> Result<ParsedResponse, PollError> {
    let body = match outcome {
        HttpOutcome::Failure { cause } => return Err(PollError::Transport(cause.clone())),
        HttpOutcome::Response { status, .. } if *status != 200 => {
            return Err(PollError::HttpStatus(*status));
        }
        HttpOutcome::Response { body, .. } => body,
    };

    let parsed: OwmCurrentResponse = serde_json::from_str(body).map_err(|e| {
        PollError::MalformedPayload(format!("{e}: {}", truncate_body(body)))
    })?;

    let main = parsed.main.ok_or_else(|| {
        PollError::MalformedPayload(format!("missing main: {}", truncate_body(body)))
    })?;

    let temperature_kelvin = main
        .temp
        .ok_or_else(|| PollError::MalformedPayload("missing main.temp".to_string()))?;

    let (wind_speed_mph, wind_direction_degrees) = match parsed.wind {
        Some(wind) => (wind.speed, wind.deg),
        None => (None, None),
    };

    Ok(ParsedResponse {
        name: parsed.name.filter(|n| !n.trim().is_empty()),
        reading: WeatherReading {
            temperature_kelvin,
            humidity_percent: main.humidity,
            wind_speed_mph,
            wind_direction_degrees,
        },
    })
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
