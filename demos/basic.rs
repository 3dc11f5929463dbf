use redis_pubsub_core::{Config, PubSubClient, Subscriber, TcpConnector};

#[tokio::main]
pub async fn main() -> redis_pubsub_core::Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::builder("127.0.0.1", 6379).exit_on_disconnection(false).build();
    let client = PubSubClient::connect(config, TcpConnector).await?;

    let (subscriber, mut events) = Subscriber::new();
    client.subscribe(["news"], &subscriber).await?;
    client.psubscribe(["chat.*"], &subscriber).await?;

    while let Some(event) = events.recv().await {
        println!("{event:?}");
    }

    Ok(())
}
