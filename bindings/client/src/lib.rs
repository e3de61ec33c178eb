mod api;
mod client;
mod step;
mod urls;

pub mod prelude {
    pub use crate::api::{parse_reservation, PlacementReservation, PrepareUploadRequest};
    pub use crate::client::{
        PointcloudClient, GET_POINTCLOUD_LABEL, PREPARE_UPLOAD_LABEL, UPLOAD_POINTCLOUD_LABEL,
    };
    pub use crate::step::{StepRequest, StepResult};
    pub use crate::urls::{object_put_url, pointcloud_url, prepare_upload_url};

    // Re-exported so that scenario code does not need its own reqwest dependency to talk
    // about methods and status codes.
    pub use reqwest::{Method, StatusCode};
}
