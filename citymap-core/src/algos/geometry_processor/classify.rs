use crate::{source::RawEdge, types::RoadClass};

/// Road class of a raw way.
///
/// Multi-valued tags (`residential;service`) use their first value. Pavements mapped as
/// `footway=sidewalk` alongside a vehicular way are non-vehicular.
pub(crate) fn classify(edge: &RawEdge) -> RoadClass {
    let highway = edge
        .highway
        .as_deref()
        .map(|tag| tag.split(';').next().unwrap_or(tag).trim());

    if edge.footway.as_deref().map(str::trim) == Some("sidewalk") {
        return RoadClass::NonVehicular;
    }

    RoadClass::from_tag(highway)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sidewalks_are_non_vehicular() {
        let mut edge = RawEdge::new("residential", vec![]);
        assert_eq!(classify(&edge), RoadClass::Local);

        edge.footway = Some("sidewalk".to_string());
        assert_eq!(classify(&edge), RoadClass::NonVehicular);

        edge.footway = Some("crossing".to_string());
        assert_eq!(classify(&edge), RoadClass::Local);
    }

    #[test]
    fn multi_valued_tags_use_the_first_value() {
        let edge = RawEdge::new("primary;service", vec![]);
        assert_eq!(classify(&edge), RoadClass::Arterial);

        let edge = RawEdge {
            highway: None,
            footway: None,
            points: vec![],
        };
        assert_eq!(classify(&edge), RoadClass::Local);
    }
}
