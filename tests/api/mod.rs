mod chat_tests;
mod health_tests;
mod notification_tests;
mod presence_tests;
mod realtime_tests;
mod ws_tests;
