use earthcreds::Error;
use std::env;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Error> {
    let args: Vec<String> = env::args().collect();
    if args.len() <= 1 {
        println!("Usage: <s3-url> [dataset]");
        return Err(Error::InvalidData(
            "Missing commandline argument".to_string(),
        ));
    }

    let url = &args[1];
    let dataset = args.get(2).map(String::as_str).unwrap_or("opera");
    let h5 = earthcreds::open(url, dataset).await?;
    println!(
        "url={}, size={}, signature_offset={}",
        url,
        h5.size(),
        h5.signature_offset()
    );
    println!("source stats: {}", h5.get_stats());
    Ok(())
}
