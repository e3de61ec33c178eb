use anyhow::anyhow;
use url::Url;

/// The coordination API endpoint that issues upload placement reservations.
pub fn prepare_upload_url(api_base: &Url) -> anyhow::Result<Url> {
    extend_path(api_base, ["upload", "prepare"])
}

/// The coordination API endpoint for fetching the point cloud stored under a geohash.
pub fn pointcloud_url(api_base: &Url, geohash: &str) -> anyhow::Result<Url> {
    extend_path(api_base, ["pointcloud", geohash])
}

/// The storage destination for an upload, built from a placement reservation.
///
/// The bucket name and each `/`-delimited segment of the object key are percent-encoded
/// independently, so an encoded segment can never reintroduce a path separator.
pub fn object_put_url(storage_base: &Url, bucket: &str, object_key: &str) -> anyhow::Result<Url> {
    extend_path(
        storage_base,
        std::iter::once(bucket).chain(object_key.split('/')),
    )
}

fn extend_path<'a>(
    base: &Url,
    segments: impl IntoIterator<Item = &'a str>,
) -> anyhow::Result<Url> {
    let mut url = base.clone();
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| anyhow!("Base URL [{base}] cannot have a path"))?;
        path.pop_if_empty();
        for segment in segments {
            path.push(segment);
        }
    }
    Ok(url)
}
