use weft_types::PerformerRecord;

/// Image URL for a performer. The `t` parameter changes whenever the row
/// does, so clients drop cached images on update.
pub fn performer_image_url(base_url: &str, performer: &PerformerRecord) -> String {
    format!(
        "{}/performer/{}/image?t={}",
        base_url.trim_end_matches('/'),
        performer.id,
        performer.updated_at
    )
}

#[cfg(test)]
mod tests {
    use weft_types::PerformerId;

    use super::*;

    #[test]
    fn image_url_carries_id_and_update_stamp() {
        let mut record = PerformerRecord::new(PerformerId(12), "Ada");
        record.updated_at = 1_700_000_000;
        assert_eq!(
            performer_image_url("http://localhost:9999/", &record),
            "http://localhost:9999/performer/12/image?t=1700000000"
        );
    }

    #[test]
    fn empty_base_yields_root_relative_url() {
        let record = PerformerRecord::new(PerformerId(3), "Bo");
        assert_eq!(performer_image_url("", &record), "/performer/3/image?t=0");
    }
}
