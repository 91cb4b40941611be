mod dispatcher;
mod http;
