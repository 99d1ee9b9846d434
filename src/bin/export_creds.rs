use earthcreds::Error;
use std::env;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Error> {
    let args: Vec<String> = env::args().collect();
    if args.len() <= 1 {
        println!("Usage: <dataset> (one of sentinel1, opera, opera-uat)");
        return Err(Error::InvalidData(
            "Missing commandline argument".to_string(),
        ));
    }

    let creds = earthcreds::auth::get_s3_credentials(&args[1]).await?;
    print!("{}", creds.format_export());
    Ok(())
}
