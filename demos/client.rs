use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

#[tokio::main]
async fn main() {
    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:7".to_string()); // Change to your server's address
    let stream = TcpStream::connect(&addr).await.expect("Failed to connect");
    println!("Connected to {addr}. Lines you type are echoed back.");

    let (read_half, mut write_half) = stream.into_split();

    // Print everything the server sends, echoes and keepalive probes alike.
    tokio::spawn(async move {
        let mut lines = BufReader::new(read_half).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            println!("{line}");
        }
    });

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = stdin.next_line().await {
        write_half
            .write_all(line.as_bytes())
            .await
            .expect("Failed to send line");
        write_half.write_all(b"\n").await.expect("Failed to send line");
    }
}
