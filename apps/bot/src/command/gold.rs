use crate::Data;

pub async fn gold(data: &Data) -> String {
    data.gold.report().await
}
