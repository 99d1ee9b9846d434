// Authentication against the NASA Earthdata login service (URS) to obtain
// temporary S3 credentials from a dataset's s3credentials endpoint
mod earthdata;

pub use earthdata::{get_frozen_credentials, get_s3_credentials, EarthdataAuth};
