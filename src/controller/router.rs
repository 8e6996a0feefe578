//! Regex based path router

use regex::Regex;

type ParamsConverter<R> = Fn(Vec<&str>) -> Option<R> + Send + Sync;

/// Matches request paths against registered patterns, first match wins
pub struct RouteParser<R> {
    routes: Vec<(Regex, Box<ParamsConverter<R>>)>,
}

impl<R> Default for RouteParser<R> {
    fn default() -> Self {
        Self { routes: vec![] }
    }
}

impl<R> RouteParser<R> {
    /// Adds a route without params
    pub fn add_route<F>(&mut self, pattern: &str, f: F)
    where
        F: Fn() -> R + Send + Sync + 'static,
    {
        self.add_route_with_params(pattern, move |_| Some(f()));
    }

    /// Adds a route whose capture groups are handed to `converter`
    pub fn add_route_with_params<F>(&mut self, pattern: &str, converter: F)
    where
        F: Fn(Vec<&str>) -> Option<R> + Send + Sync + 'static,
    {
        match Regex::new(pattern) {
            Ok(regex) => self.routes.push((regex, Box::new(converter))),
            Err(e) => error!("Route pattern {} is skipped: {}", pattern, e),
        }
    }

    /// Route of the path, `None` when nothing matches or params do not convert
    pub fn test(&self, path: &str) -> Option<R> {
        self.routes.iter().filter_map(|(regex, converter)| {
            regex.captures(path).and_then(|captures| {
                let params = captures
                    .iter()
                    .skip(1)
                    .filter_map(|capture| capture.map(|m| m.as_str()))
                    .collect::<Vec<_>>();
                converter(params)
            })
        }).next()
    }
}
