pub mod auth;
pub mod credentials;
mod errors;
pub mod hdf5;
mod hex;
pub mod s3;
mod sources;

pub use credentials::{endpoint_url, AwsCredentials, DEFAULT_REGION, ENDPOINTS};
pub use errors::Error;
pub use hdf5::{OpenOptions, RemoteHdf5};

/// Opens a remote HDF5 file, fetching fresh Earthdata credentials for
/// `dataset` first
pub async fn open(url: &str, dataset: &str) -> Result<RemoteHdf5, Error> {
    RemoteHdf5::open(url, None, dataset, OpenOptions::default()).await
}
