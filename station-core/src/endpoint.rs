use reqwest::Url;

use crate::{
    error::ConfigError,
    model::{Credential, Location},
};

pub const CURRENT_WEATHER_URL: &str = "http://api.openweathermap.org/data/2.5/weather";

/// Build the current-weather request URI for a location.
///
/// Pure and deterministic: the same location and credential always produce a
/// byte-identical URI. Free text is percent-encoded; the comma separating city
/// and state is kept literal.
pub fn build(location: &Location, credential: Option<&Credential>) -> Result<Url, ConfigError> {
    let mut query = match location {
        Location::CityId(id) => format!("id={}", urlencoding::encode(id)),
        Location::CityState { city, state } => format!(
            "q={},{}",
            urlencoding::encode(city),
            urlencoding::encode(state)
        ),
    };

    if let Some(key) = credential {
        query.push_str("&APPID=");
        query.push_str(&urlencoding::encode(key.expose()));
    }

    Url::parse(&format!("{CURRENT_WEATHER_URL}?{query}"))
        .map_err(|e| ConfigError::Endpoint(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn denver() -> Location {
        Location::CityState {
            city: "Denver".into(),
            state: "CO".into(),
        }
    }

    #[test]
    fn city_id_without_credential() {
        let uri = build(&Location::CityId("5419384".into()), None).unwrap();
        assert_eq!(
            uri.as_str(),
            "http://api.openweathermap.org/data/2.5/weather?id=5419384"
        );
    }

    #[test]
    fn city_id_with_credential() {
        let key = Credential::new("abcd");
        let uri = build(&Location::CityId("5419384".into()), Some(&key)).unwrap();
        assert_eq!(
            uri.as_str(),
            "http://api.openweathermap.org/data/2.5/weather?id=5419384&APPID=abcd"
        );
    }

    #[test]
    fn city_state_query() {
        let uri = build(&denver(), None).unwrap();
        assert_eq!(uri.query(), Some("q=Denver,CO"));
    }

    #[test]
    fn free_text_is_percent_encoded() {
        let location = Location::CityState {
            city: "Fort Collins".into(),
            state: "CO & Co".into(),
        };
        let uri = build(&location, Some(&Credential::new("k"))).unwrap();

        assert_eq!(uri.query(), Some("q=Fort%20Collins,CO%20%26%20Co&APPID=k"));
    }

    #[test]
    fn build_is_deterministic() {
        let key = Credential::new("abcd");
        let first = build(&denver(), Some(&key)).unwrap();
        let second = build(&denver(), Some(&key)).unwrap();

        assert_eq!(first.as_str().as_bytes(), second.as_str().as_bytes());
    }
}
